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

use chrono::Utc;
use dengue_session::{AuthGrant, MenuItem, PermissionCode, PermissionSet, SessionConfig, SessionContext, SessionError, UserAction};
use futures::StreamExt;

fn admin_grant() -> AuthGrant {
    AuthGrant {
        user_id: 42,
        role_id: 3,
        role_name: "ADMIN".to_string(),
        permissions: vec!["CASE_VIEW_ALL".to_string(), "USER_VIEW_ALL".to_string()],
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: Utc::now().timestamp_millis() + 3_600_000,
        identifier: Some("admin@dengue.example".to_string()),
    }
}

#[tokio::test]
async fn test_admin_scenario() {
    let ctx = SessionContext::in_memory().unwrap();
    ctx.manager().sign_in(admin_grant()).await.unwrap();

    let cache = ctx.permission_cache();
    assert!(cache.has_all_permissions(&[PermissionCode::CaseViewAll]).await.unwrap());
    assert!(!cache.has_all_permissions(&[PermissionCode::CaseViewAll, PermissionCode::HospitalView]).await.unwrap());
    assert!(cache.has_any_permission(&[PermissionCode::HospitalView, PermissionCode::UserViewAll]).await.unwrap());

    assert!(ctx.evaluator().can_open(MenuItem::Users).await);
    assert!(!ctx.evaluator().can_open(MenuItem::Hospitals).await);
    assert!(!ctx.evaluator().can_perform(UserAction::DeleteUser).await);
}

#[tokio::test]
async fn test_fresh_store_only_opens_public_menus() {
    let ctx = SessionContext::in_memory().unwrap();

    assert!(ctx.evaluator().can_access_menu(&[]).await);
    assert!(!ctx.evaluator().can_access_menu(&[PermissionCode::CaseViewAll]).await);
    assert_eq!(ctx.manager().current().await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_tokens_leaves_permissions() {
    let ctx = SessionContext::in_memory().unwrap();
    ctx.manager().sign_in(admin_grant()).await.unwrap();

    let credentials = ctx.credentials();
    credentials.save_access_token("tok").await.unwrap();
    credentials.save_token_expiration(Utc::now().timestamp_millis() - 1_000).await.unwrap();
    assert!(credentials.is_access_token_expired().await.unwrap());

    credentials.clear_tokens().await.unwrap();

    assert_eq!(credentials.get_access_token().await.unwrap(), None);
    assert_eq!(ctx.permission_cache().role_id().await.unwrap(), Some(3));
    assert_eq!(ctx.permission_cache().role_name().await.unwrap(), Some("ADMIN".to_string()));
    assert_eq!(
        ctx.permission_cache().permissions().await.unwrap(),
        PermissionSet::from([PermissionCode::CaseViewAll, PermissionCode::UserViewAll])
    );
}

#[tokio::test]
async fn test_unknown_code_rejects_grant_without_writes() {
    let ctx = SessionContext::in_memory().unwrap();
    let mut grant = admin_grant();
    grant.permissions.push("SELF_DESTRUCT".to_string());

    let err = ctx.manager().sign_in(grant).await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidPermission { .. }));
    assert_eq!(ctx.credentials().get_access_token().await.unwrap(), None);
    assert!(!ctx.manager().is_signed_in().await.unwrap());
}

#[tokio::test]
async fn test_refresh_replaces_permissions_wholesale() {
    let ctx = SessionContext::in_memory().unwrap();
    ctx.manager().sign_in(admin_grant()).await.unwrap();

    let mut grant = admin_grant();
    grant.permissions = vec!["MAP_VIEW".to_string()];
    grant.access_token = "access-2".to_string();
    let session = ctx.manager().refresh(grant).await.unwrap();

    assert_eq!(session.permissions, PermissionSet::from([PermissionCode::MapView]));
    let current = ctx.manager().current().await.unwrap().unwrap();
    assert_eq!(current.permissions, PermissionSet::from([PermissionCode::MapView]));
    assert_eq!(current.access_token.as_deref(), Some("access-2"));
    assert_eq!(ctx.preferences().bearer_token().await.unwrap().as_deref(), Some("access-2"));
}

#[tokio::test]
async fn test_refresh_requires_matching_session() {
    let ctx = SessionContext::in_memory().unwrap();
    assert!(matches!(ctx.manager().refresh(admin_grant()).await, Err(SessionError::NotSignedIn)));

    ctx.manager().sign_in(admin_grant()).await.unwrap();
    let mut other = admin_grant();
    other.user_id = 7;
    assert!(matches!(ctx.manager().refresh(other).await, Err(SessionError::InvalidData { .. })));
}

#[tokio::test]
async fn test_sign_out_is_idempotent_and_keeps_identifier() {
    let ctx = SessionContext::in_memory().unwrap();
    ctx.manager().sign_in(admin_grant()).await.unwrap();

    ctx.manager().sign_out().await.unwrap();
    ctx.manager().sign_out().await.unwrap();

    assert_eq!(ctx.manager().current().await.unwrap(), None);
    assert!(ctx.permission_cache().permissions().await.unwrap().is_empty());
    assert_eq!(ctx.preferences().role_id().await.unwrap(), None);
    assert_eq!(ctx.credentials().get_refresh_token().await.unwrap(), None);
    assert_eq!(ctx.credentials().get_user_identifier().await.unwrap().as_deref(), Some("admin@dengue.example"));

    ctx.manager().forget_device().await.unwrap();
    assert_eq!(ctx.credentials().get_user_identifier().await.unwrap(), None);
}

#[tokio::test]
async fn test_session_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::default().with_data_dir(dir.path());

    {
        let ctx = SessionContext::open(&config).await.unwrap();
        ctx.manager().sign_in(admin_grant()).await.unwrap();
    }

    let ctx = SessionContext::open(&config).await.unwrap();
    let session = ctx.manager().current().await.unwrap().unwrap();
    assert_eq!(session.user_id, 42);
    assert_eq!(session.role_name, "ADMIN");
    assert_eq!(session.access_token.as_deref(), Some("access-1"));

    let credentials_on_disk = std::fs::read_to_string(config.credentials_path()).unwrap();
    assert!(!credentials_on_disk.contains("access-1"));
    assert!(!credentials_on_disk.contains("refresh-1"));
}

#[tokio::test]
async fn test_stream_follows_sign_in_and_out_until_close() {
    let ctx = SessionContext::in_memory().unwrap();
    let mut snapshots = Box::pin(ctx.permission_cache().permissions_stream());

    assert_eq!(snapshots.next().await, Some(PermissionSet::new()));

    ctx.manager().sign_in(admin_grant()).await.unwrap();
    assert_eq!(
        snapshots.next().await,
        Some(PermissionSet::from([PermissionCode::CaseViewAll, PermissionCode::UserViewAll]))
    );

    ctx.manager().sign_out().await.unwrap();
    assert_eq!(snapshots.next().await, Some(PermissionSet::new()));

    ctx.close();
    assert_eq!(snapshots.next().await, None);
}
