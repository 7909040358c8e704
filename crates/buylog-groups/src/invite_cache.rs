use std::collections::HashMap;
use std::sync::Arc;

use buylog_storage::{Invite, InviteId, Store, StoreError, UserId};
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::RwLock;

use crate::error::InviteError;

/// Write-through mirror of pending directed invites, unique per (sender, recipient).
pub struct InviteCache {
    store: Arc<dyn Store>,
    state: RwLock<InviteState>,
}

#[derive(Default)]
struct InviteState {
    by_pair: HashMap<(UserId, UserId), Invite>,
    // Highest id ever seen; new ids are proposed above it even after deletes.
    last_id: i64,
}

impl InviteState {
    fn insert(&mut self, invite: Invite) {
        self.last_id = self.last_id.max(invite.id.0);
        self.by_pair.insert(invite.pair(), invite);
    }

    fn collect(&self, keep: impl Fn(&Invite) -> bool) -> Vec<Invite> {
        let mut out: Vec<Invite> = self.by_pair.values().filter(|i| keep(i)).cloned().collect();
        out.sort_by_key(|i| i.id);
        out
    }
}

impl InviteCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            state: RwLock::new(InviteState::default()),
        }
    }

    /// Warm the cache from every invite row in the store.
    pub async fn load(store: Arc<dyn Store>) -> Result<Self, StoreError> {
        let mut state = InviteState::default();
        for invite in store.load_all_invites().await? {
            state.insert(invite);
        }
        Ok(Self {
            store,
            state: RwLock::new(state),
        })
    }

    pub async fn incoming_to(&self, user_id: &UserId) -> Vec<Invite> {
        self.state.read().await.collect(|i| i.to_user_id == *user_id)
    }

    pub async fn outgoing_from(&self, user_id: &UserId) -> Vec<Invite> {
        self.state.read().await.collect(|i| i.from_user_id == *user_id)
    }

    pub async fn find(&self, from: &UserId, to: &UserId) -> Option<Invite> {
        self.state.read().await.by_pair.get(&(*from, *to)).cloned()
    }

    /// Create the (from → to) invite.
    ///
    /// The existence check and the store write share the write lock, so of two racing
    /// creates for the same pair exactly one succeeds. Timestamps are kept at
    /// millisecond precision, which is what the store persists.
    pub async fn create(&self, from: &UserId, to: &UserId) -> Result<InviteId, InviteError> {
        let mut state = self.state.write().await;
        if state.by_pair.contains_key(&(*from, *to)) {
            return Err(InviteError::AlreadyExists);
        }

        let proposed = Invite {
            id: InviteId(state.last_id + 1),
            from_user_id: *from,
            to_user_id: *to,
            created_at: Utc::now().trunc_subsecs(3),
        };
        let id = self.store.insert_invite(&proposed).await?;

        state.insert(Invite { id, ..proposed });
        Ok(id)
    }

    /// Withdraw a single (from → to) invite.
    pub async fn revoke(&self, from: &UserId, to: &UserId) -> Result<(), InviteError> {
        let mut state = self.state.write().await;
        let id = state
            .by_pair
            .get(&(*from, *to))
            .map(|i| i.id)
            .ok_or(InviteError::NotFound)?;

        self.store.delete_invite(&id).await?;
        state.by_pair.remove(&(*from, *to));
        Ok(())
    }

    /// Delete the invites in both directions between `a` and `b`. Missing ones are fine.
    pub async fn delete_pair(&self, a: &UserId, b: &UserId) -> Result<(), InviteError> {
        let mut state = self.state.write().await;
        self.store.delete_invites_between(a, b).await?;
        state.by_pair.remove(&(*a, *b));
        state.by_pair.remove(&(*b, *a));
        Ok(())
    }

    /// Delete every invite created strictly before `cutoff`.
    /// Returns the number of rows the store deleted.
    ///
    /// The cutoff is truncated to milliseconds, the precision the store compares at.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, InviteError> {
        let cutoff = cutoff.trunc_subsecs(3);
        let mut state = self.state.write().await;
        let deleted = self.store.delete_invites_older_than(cutoff).await?;
        state.by_pair.retain(|_, invite| invite.created_at >= cutoff);
        Ok(deleted)
    }
}
