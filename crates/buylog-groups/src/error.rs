use buylog_storage::{StoreError, UserId};
use thiserror::Error;

/// Errors returned by [`crate::GroupCache`] mutators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("group not found")]
    NotFound,
    #[error("user {0} already belongs to a group")]
    AlreadyMember(UserId),
    #[error("group is full ({} members)", crate::MAX_GROUP_MEMBERS)]
    CapacityExceeded,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by [`crate::InviteCache`] mutators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InviteError {
    #[error("invite not found")]
    NotFound,
    #[error("invite already exists")]
    AlreadyExists,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by [`crate::MembershipProtocol::process_invite`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("user not found")]
    NotFound,
    #[error("cannot invite yourself")]
    SelfInvite,
    #[error("invite already exists")]
    DuplicateInvite,
    #[error("cannot invite users who are in different groups")]
    IncompatibleGroups,
    #[error("users are already in the same group")]
    AlreadyGrouped,
    #[error("group has reached maximum size of {} members", crate::MAX_GROUP_MEMBERS)]
    CapacityExceeded,
    #[error(transparent)]
    Store(StoreError),
    /// The invite pair was deleted but the group mutation failed afterwards. The pair is
    /// not restored; the users have to invite each other again.
    #[error("merge failed after invites were consumed: {0}")]
    MergeFailed(#[source] GroupError),
}

impl From<InviteError> for ProtocolError {
    fn from(e: InviteError) -> Self {
        match e {
            InviteError::NotFound => ProtocolError::NotFound,
            InviteError::AlreadyExists => ProtocolError::DuplicateInvite,
            InviteError::Store(e) => ProtocolError::Store(e),
        }
    }
}
