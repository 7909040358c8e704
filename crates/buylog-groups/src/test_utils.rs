//! Shared fixtures for the cache and protocol tests.

use std::sync::Arc;

use buylog_storage::{CreateUserParams, GroupMember, Store, UserId};
use buylog_store_sqlite::SqliteStore;

pub async fn sqlite_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.unwrap())
}

pub async fn add_users(store: &SqliteStore, logins: &[&str]) -> Vec<UserId> {
    let mut ids = Vec::with_capacity(logins.len());
    for login in logins {
        let id = store
            .create_user(&CreateUserParams {
                login: login.to_string(),
                credential_hash: "x".to_string(),
            })
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

/// `(user, position)` pairs of a member list.
pub fn positions(members: &[GroupMember]) -> Vec<(UserId, u32)> {
    members.iter().map(|m| (m.user_id, m.position)).collect()
}
