use buylog_storage::{GroupMember, Store, StoreError};

/// Restore gap-free 1-based positions after a departure.
///
/// Members are stable-sorted by their current position and assigned `index + 1`.
/// Only memberships whose position actually changes are written to the store. Each
/// entry in `members` is updated right after its write succeeds, so on error the
/// slice still mirrors exactly what was persisted. Returns the number of rows written.
pub async fn renumber(store: &dyn Store, members: &mut [GroupMember]) -> Result<usize, StoreError> {
    members.sort_by_key(|m| m.position);

    let mut written = 0;
    for (index, member) in members.iter_mut().enumerate() {
        let position = index as u32 + 1;
        if member.position == position {
            continue;
        }
        let updated = GroupMember {
            position,
            ..member.clone()
        };
        store.update_membership_position(&updated).await?;
        *member = updated;
        written += 1;
    }
    Ok(written)
}
