//! The Store trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait the in-memory caches write through to.
///
/// Every mutating method is expected to be durable once it returns `Ok`; the
/// caches only update memory after that.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a new user (returns generated ID).
    async fn create_user(&self, params: &CreateUserParams) -> Result<UserId, StoreError>;

    /// Get user by ID.
    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError>;

    /// Get user by login.
    async fn get_user_by_login(&self, login: &str) -> Result<User, StoreError>;

    // ───────────────────────────────────── Group memberships ──────────────────────────────

    /// All membership rows of all groups, ordered by group and position.
    async fn load_all_group_memberships(&self) -> Result<Vec<GroupMember>, StoreError>;

    /// Allocate a new group id and insert `founder` at position 1.
    async fn create_group(&self, founder: &UserId) -> Result<GroupId, StoreError>;

    /// Insert a single membership row.
    async fn insert_membership(&self, member: &GroupMember) -> Result<(), StoreError>;

    /// Persist `member.position` for the (group, user) row.
    async fn update_membership_position(&self, member: &GroupMember) -> Result<(), StoreError>;

    /// Delete the membership row of a user.
    async fn delete_membership(&self, user_id: &UserId) -> Result<(), StoreError>;

    /// Delete every membership row of a group.
    /// Returns the number of deleted rows.
    async fn delete_memberships_for_group(&self, group_id: &GroupId) -> Result<u64, StoreError>;

    /// Number of membership rows for a group (0 if the group does not exist).
    async fn count_members_in_group(&self, group_id: &GroupId) -> Result<u64, StoreError>;

    // ───────────────────────────────────── Invites ────────────────────────────────────────

    /// All pending invites.
    async fn load_all_invites(&self) -> Result<Vec<Invite>, StoreError>;

    /// Insert an invite. `invite.id` is the caller's proposed identifier; the
    /// identifier actually persisted is returned.
    async fn insert_invite(&self, invite: &Invite) -> Result<InviteId, StoreError>;

    /// Delete a single invite.
    async fn delete_invite(&self, invite_id: &InviteId) -> Result<(), StoreError>;

    /// Delete invites in both directions between two users.
    /// Returns the number of deleted rows.
    async fn delete_invites_between(&self, a: &UserId, b: &UserId) -> Result<u64, StoreError>;

    /// Delete every invite created strictly before `cutoff`.
    /// Returns the number of deleted rows.
    async fn delete_invites_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
