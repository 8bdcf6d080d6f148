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

//! HTTP server implementation using Hyper

use crate::auth::JwtManager;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::roles::RolePermissionStore;
use crate::router::Router;
use dengue_store::{FileStore, KeyValueStore, MemoryStore};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Permission service using Hyper
pub struct ApiServer {
    bind_address: SocketAddr,
    store: Arc<dyn KeyValueStore>,
    router: Router,
}

impl ApiServer {
    /// Create a new API server
    pub async fn new(config: Config) -> ApiResult<Self> {
        let bind_address: SocketAddr = config.bind_address.parse().map_err(|e| ApiError::InternalServerError {
            message: format!("Invalid bind address {:?}: {}", config.bind_address, e),
        })?;

        let store: Arc<dyn KeyValueStore> = if config.in_memory {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::open(config.roles_path()).await?)
        };

        let roles = RolePermissionStore::open(store.clone()).await?;
        let jwt = Arc::new(JwtManager::new(&config.jwt_secret, &config.jwt_issuer, &config.jwt_audience));
        let router = Router::new(jwt, roles, config.max_body_size);

        info!("Permission service created (in_memory={})", config.in_memory);

        Ok(Self { bind_address, store, router })
    }

    /// Get the bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> ApiResult<()> {
        let listener = TcpListener::bind(self.bind_address).await?;
        info!("Dengue Track permission service listening on http://{}", self.bind_address);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down permission service");
                    self.store.close();
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let router = self.router.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(router.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_bind_address_is_a_server_error() {
        let config = Config {
            bind_address: "not-an-address".to_string(),
            in_memory: true,
            ..Config::default()
        };

        let Err(err) = ApiServer::new(config).await else {
            panic!("server accepted an invalid bind address");
        };
        assert!(matches!(err, ApiError::InternalServerError { .. }));
        assert_eq!(err.status_code(), hyper::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
