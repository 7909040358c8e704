use std::sync::Arc;

use buylog_storage::{Group, GroupId, InviteId, Store, StoreError, UserId};

use crate::error::ProtocolError;
use crate::group_cache::GroupCache;
use crate::invite_cache::InviteCache;

/// Result of a successful [`MembershipProtocol::process_invite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No reciprocal invite existed; a new one was recorded.
    InviteCreated(InviteId),
    /// The invite completed a mutual pair and the two users now share this group.
    GroupMerged(GroupId),
}

/// Mutual-invite protocol: two users end up in the same group once each has invited
/// the other.
pub struct MembershipProtocol {
    store: Arc<dyn Store>,
    groups: Arc<GroupCache>,
    invites: Arc<InviteCache>,
}

impl MembershipProtocol {
    pub fn new(store: Arc<dyn Store>, groups: Arc<GroupCache>, invites: Arc<InviteCache>) -> Self {
        Self {
            store,
            groups,
            invites,
        }
    }

    pub fn groups(&self) -> &Arc<GroupCache> {
        &self.groups
    }

    pub fn invites(&self) -> &Arc<InviteCache> {
        &self.invites
    }

    /// Handle an invite from `sender` to the user called `recipient_login`.
    ///
    /// Checks run in order: the recipient must exist and differ from the sender, the
    /// same invite must not already be pending, and the two users' groups must be
    /// compatible and not full. If the recipient has already invited the sender, both
    /// invites are consumed and the users are merged; otherwise a new invite is stored.
    pub async fn process_invite(
        &self,
        sender: &UserId,
        recipient_login: &str,
    ) -> Result<Outcome, ProtocolError> {
        let recipient = match self.store.get_user_by_login(recipient_login).await {
            Ok(user) => user.id,
            Err(StoreError::NotFound) => return Err(ProtocolError::NotFound),
            Err(e) => return Err(ProtocolError::Store(e)),
        };
        if recipient == *sender {
            return Err(ProtocolError::SelfInvite);
        }

        if self.invites.find(sender, &recipient).await.is_some() {
            return Err(ProtocolError::DuplicateInvite);
        }

        let sender_group = self.groups.lookup_group_by_user(sender).await;
        let recipient_group = self.groups.lookup_group_by_user(&recipient).await;
        check_groups(sender_group.as_ref(), recipient_group.as_ref())?;

        if self.invites.find(&recipient, sender).await.is_none() {
            let id = self.invites.create(sender, &recipient).await?;
            return Ok(Outcome::InviteCreated(id));
        }

        self.invites.delete_pair(sender, &recipient).await?;

        // check_groups leaves at most one of the two users grouped.
        let merged = match sender_group.or(recipient_group) {
            // The recipient's invite came first, so the recipient founds the group.
            None => self.groups.form_group(&recipient, sender).await,
            Some(group) => {
                let joiner = if group.contains(sender) {
                    &recipient
                } else {
                    sender
                };
                self.groups
                    .add_member(&group.id, joiner)
                    .await
                    .map(|_| group.id)
            }
        };

        merged
            .map(Outcome::GroupMerged)
            .map_err(ProtocolError::MergeFailed)
    }
}

/// Two users may only join up when at most one of them is grouped, and that group
/// still has room.
fn check_groups(sender: Option<&Group>, recipient: Option<&Group>) -> Result<(), ProtocolError> {
    if let (Some(a), Some(b)) = (sender, recipient) {
        return Err(if a.id == b.id {
            ProtocolError::AlreadyGrouped
        } else {
            ProtocolError::IncompatibleGroups
        });
    }
    if recipient.is_some_and(Group::is_full) || sender.is_some_and(Group::is_full) {
        return Err(ProtocolError::CapacityExceeded);
    }
    Ok(())
}
