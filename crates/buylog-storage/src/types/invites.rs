//! Invite types for the mutual-invite protocol.

use chrono::{DateTime, Utc};

use super::{InviteId, UserId};

/// Directed invite record. (A→B) and (B→A) are distinct records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invite {
    pub id: InviteId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    /// The ordered (sender, recipient) pair this invite is unique on.
    pub fn pair(&self) -> (UserId, UserId) {
        (self.from_user_id, self.to_user_id)
    }
}
