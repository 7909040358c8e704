//! Group types for household grouping.

use super::{GroupId, UserId};

/// Maximum number of members a group can hold.
pub const MAX_GROUP_MEMBERS: usize = 5;

/// Group membership record. `position` is 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub position: u32,
}

/// A group and its members, ordered by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_GROUP_MEMBERS
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.members.iter().any(|m| m.user_id == *user_id)
    }

    pub fn position_of(&self, user_id: &UserId) -> Option<u32> {
        self.members
            .iter()
            .find(|m| m.user_id == *user_id)
            .map(|m| m.position)
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.user_id).collect()
    }

    /// True when the positions are exactly `1..=member_count` in order.
    pub fn has_contiguous_positions(&self) -> bool {
        self.members
            .iter()
            .enumerate()
            .all(|(index, m)| m.position as usize == index + 1)
    }
}
