//! Group/invite consistency engine for buylog.
//!
//! [`GroupCache`] and [`InviteCache`] mirror the group-membership and invite rows of a
//! [`buylog_storage::Store`] in memory. Each cache owns its own read/write lock and
//! writes through to the store before touching memory, so the cache never holds state
//! the store does not have. [`MembershipProtocol`] turns one-directional invites into
//! group membership changes on top of both caches.
//!
//! No operation holds both cache locks at once. A merge therefore is not atomic across
//! the two caches: between deleting an invite pair and finishing the group mutation a
//! reader may observe "no invite, not yet merged". Nothing can re-create the deleted
//! pair in that window except a fresh invite request, which will see the group that
//! is being formed.

mod error;
mod group_cache;
mod invite_cache;
mod protocol;
mod renumber;

#[cfg(test)]
mod test_utils;

pub use error::{GroupError, InviteError, ProtocolError};
pub use group_cache::GroupCache;
pub use invite_cache::InviteCache;
pub use protocol::{MembershipProtocol, Outcome};
pub use renumber::renumber;

pub use buylog_storage::MAX_GROUP_MEMBERS;
