// Dengue Track
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Bearer token validation

use crate::error::{ApiError, ApiResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT claims issued by the authentication provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Role the user signed in with
    pub role_id: i64,

    /// Display name of that role
    pub role_name: String,
}

impl Claims {
    /// Create new claims for a user
    pub fn new(user_id: i64, role_id: i64, role_name: impl Into<String>, issuer: &str, audience: &str, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: (now + expires_in).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            role_id,
            role_name: role_name.into(),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager").field("issuer", &self.issuer).field("audience", &self.audience).finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Create a new JWT manager with a secret key
    pub fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Issue a token for `user_id` acting as `role_id`
    pub fn issue(&self, user_id: i64, role_id: i64, role_name: &str, expires_in: Duration) -> ApiResult<String> {
        self.create_token(&Claims::new(user_id, role_id, role_name, &self.issuer, &self.audience, expires_in))
    }

    /// Create a JWT token
    pub fn create_token(&self, claims: &Claims) -> ApiResult<String> {
        let header = Header::new(Algorithm::HS256);
        Ok(encode(&header, claims, &self.encoding_key)?)
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        if claims.is_expired() {
            return Err(ApiError::Unauthorized {
                message: "Token has expired".to_string(),
            });
        }

        Ok(claims)
    }
}

/// Extract token from Authorization header
pub fn extract_token_from_header(auth_header: &str) -> ApiResult<&str> {
    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(ApiError::Unauthorized {
            message: "Invalid authorization header format".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret", "dengue-auth", "dengue-track")
    }

    #[test]
    fn test_issue_and_validate() {
        let jwt = manager();
        let token = jwt.issue(42, 3, "ADMIN", Duration::hours(1)).unwrap();

        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role_id, 3);
        assert_eq!(claims.role_name, "ADMIN");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = manager().issue(42, 3, "ADMIN", Duration::hours(1)).unwrap();
        let other = JwtManager::new("another-secret", "dengue-auth", "dengue-track");

        assert!(matches!(other.validate_token(&token), Err(ApiError::JwtError(_))));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let token = JwtManager::new("test-secret", "dengue-auth", "someone-else").issue(1, 1, "CITIZEN", Duration::hours(1)).unwrap();

        assert!(manager().validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = manager().issue(1, 1, "CITIZEN", Duration::hours(-2)).unwrap();

        assert!(manager().validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header("Bearer abc.def").unwrap(), "abc.def");
        assert!(extract_token_from_header("Basic abc").is_err());
        assert!(extract_token_from_header("Bearer ").is_err());
    }
}
