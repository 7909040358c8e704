pub mod check;
pub mod group;
pub mod invite;
pub mod user;

use std::sync::Arc;

use buylog_groups::{GroupCache, InviteCache, MembershipProtocol};
use buylog_storage::{Store, StoreError, User};
use buylog_store_sqlite::SqliteStore;

pub use check::cmd_check;
pub use group::{cmd_group_leave, cmd_group_show};
pub use invite::{cmd_invite_list, cmd_invite_purge, cmd_invite_revoke, cmd_invite_send};
pub use user::cmd_user_add;

/// Store handle plus caches warmed from it.
pub struct Context {
    pub store: Arc<dyn Store>,
    pub groups: Arc<GroupCache>,
    pub invites: Arc<InviteCache>,
    pub protocol: MembershipProtocol,
}

impl Context {
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let store = SqliteStore::open(database_url).await?;
        tracing::debug!("opened {}", database_url);
        Self::with_store(Arc::new(store)).await
    }

    /// Warm both caches from an already opened store.
    pub async fn with_store(store: Arc<dyn Store>) -> Result<Self, StoreError> {
        let groups = Arc::new(GroupCache::load(store.clone()).await?);
        let invites = Arc::new(InviteCache::load(store.clone()).await?);
        let protocol = MembershipProtocol::new(store.clone(), groups.clone(), invites.clone());

        tracing::debug!(groups = groups.groups().await.len(), "caches loaded");
        Ok(Self {
            store,
            groups,
            invites,
            protocol,
        })
    }

    pub async fn user(&self, login: &str) -> Result<User, Box<dyn std::error::Error>> {
        match self.store.get_user_by_login(login).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(format!("User '{}' not found", login).into()),
            Err(e) => Err(e.into()),
        }
    }
}
