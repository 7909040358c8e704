use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use buylog_storage::{Group, GroupId, GroupMember, Store, StoreError, UserId, MAX_GROUP_MEMBERS};
use tokio::sync::RwLock;

use crate::error::GroupError;
use crate::renumber::renumber;

/// Write-through mirror of all group memberships.
///
/// Groups are indexed by id and by member. Every mutation runs as one critical
/// section under the write lock: the store is written first and memory is updated
/// only with what the store accepted. Readers always get clones.
pub struct GroupCache {
    store: Arc<dyn Store>,
    state: RwLock<GroupState>,
}

#[derive(Default)]
struct GroupState {
    group_by_id: HashMap<GroupId, Group>,
    group_by_user: HashMap<UserId, GroupId>,
}

impl GroupState {
    fn insert_group(&mut self, group: Group) {
        for member in &group.members {
            self.group_by_user.insert(member.user_id, group.id);
        }
        self.group_by_id.insert(group.id, group);
    }

    fn remove_group(&mut self, group_id: &GroupId) -> Option<Group> {
        let group = self.group_by_id.remove(group_id)?;
        for member in &group.members {
            self.group_by_user.remove(&member.user_id);
        }
        Some(group)
    }
}

impl GroupCache {
    /// An empty cache. Use [`GroupCache::load`] to mirror an existing store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            state: RwLock::new(GroupState::default()),
        }
    }

    /// Warm the cache from every membership row in the store.
    pub async fn load(store: Arc<dyn Store>) -> Result<Self, StoreError> {
        let rows = store.load_all_group_memberships().await?;

        let mut by_group: BTreeMap<GroupId, Vec<GroupMember>> = BTreeMap::new();
        for row in rows {
            by_group.entry(row.group_id).or_default().push(row);
        }

        let mut state = GroupState::default();
        for (id, mut members) in by_group {
            members.sort_by_key(|m| m.position);
            state.insert_group(Group { id, members });
        }

        Ok(Self {
            store,
            state: RwLock::new(state),
        })
    }

    pub async fn lookup_group(&self, group_id: &GroupId) -> Option<Group> {
        self.state.read().await.group_by_id.get(group_id).cloned()
    }

    pub async fn lookup_group_by_user(&self, user_id: &UserId) -> Option<Group> {
        let state = self.state.read().await;
        let group_id = state.group_by_user.get(user_id)?;
        state.group_by_id.get(group_id).cloned()
    }

    /// Member count of a group, 0 if it does not exist.
    pub async fn member_count(&self, group_id: &GroupId) -> usize {
        self.state
            .read()
            .await
            .group_by_id
            .get(group_id)
            .map_or(0, Group::member_count)
    }

    /// Snapshot of all groups ordered by id.
    pub async fn groups(&self) -> Vec<Group> {
        let state = self.state.read().await;
        let mut groups: Vec<Group> = state.group_by_id.values().cloned().collect();
        groups.sort_by_key(|g| g.id);
        groups
    }

    /// Create a group whose sole member is `user_id` at position 1.
    pub async fn create_group(&self, user_id: &UserId) -> Result<GroupId, GroupError> {
        let mut state = self.state.write().await;
        if state.group_by_user.contains_key(user_id) {
            return Err(GroupError::AlreadyMember(*user_id));
        }

        let group_id = self.store.create_group(user_id).await?;
        state.insert_group(Group {
            id: group_id,
            members: vec![GroupMember {
                group_id,
                user_id: *user_id,
                position: 1,
            }],
        });
        Ok(group_id)
    }

    /// Create a group with `founder` at position 1 and `second` at position 2.
    ///
    /// Both rows are written inside one critical section, so no reader ever sees the
    /// single-member intermediate. If the second insert fails the founder row is
    /// deleted again before the error is returned.
    pub async fn form_group(&self, founder: &UserId, second: &UserId) -> Result<GroupId, GroupError> {
        let mut state = self.state.write().await;
        for user_id in [founder, second] {
            if state.group_by_user.contains_key(user_id) {
                return Err(GroupError::AlreadyMember(*user_id));
            }
        }
        if founder == second {
            return Err(GroupError::AlreadyMember(*second));
        }

        let group_id = self.store.create_group(founder).await?;
        let founder_member = GroupMember {
            group_id,
            user_id: *founder,
            position: 1,
        };
        let second_member = GroupMember {
            group_id,
            user_id: *second,
            position: 2,
        };

        if let Err(e) = self.store.insert_membership(&second_member).await {
            if self.store.delete_memberships_for_group(&group_id).await.is_err() {
                // The founder row is still persisted; mirror it.
                state.insert_group(Group {
                    id: group_id,
                    members: vec![founder_member],
                });
            }
            return Err(e.into());
        }

        state.insert_group(Group {
            id: group_id,
            members: vec![founder_member, second_member],
        });
        Ok(group_id)
    }

    /// Append `user_id` to a group at position `member_count + 1`.
    ///
    /// A group left with gaps by an earlier failed renumber is renumbered first, in the
    /// same critical section, so the new position cannot collide with a stale one.
    pub async fn add_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<(), GroupError> {
        let mut state = self.state.write().await;
        if state.group_by_user.contains_key(user_id) {
            return Err(GroupError::AlreadyMember(*user_id));
        }

        let group = state
            .group_by_id
            .get_mut(group_id)
            .ok_or(GroupError::NotFound)?;
        if !group.has_contiguous_positions() {
            renumber(self.store.as_ref(), &mut group.members).await?;
        }
        let count = group.member_count();
        if count >= MAX_GROUP_MEMBERS {
            return Err(GroupError::CapacityExceeded);
        }

        let member = GroupMember {
            group_id: *group_id,
            user_id: *user_id,
            position: count as u32 + 1,
        };
        self.store.insert_membership(&member).await?;

        state.group_by_user.insert(*user_id, *group_id);
        if let Some(group) = state.group_by_id.get_mut(group_id) {
            group.members.push(member);
        }
        Ok(())
    }

    /// Remove a user from their group.
    ///
    /// A group left with fewer than two members is dissolved; otherwise the remaining
    /// members are renumbered. Removal, dissolution and renumbering share one critical
    /// section. If a store write fails after the membership row was deleted, the cache
    /// is left mirroring what was persisted up to that point.
    pub async fn remove_member(&self, user_id: &UserId) -> Result<(), GroupError> {
        let mut state = self.state.write().await;
        let group_id = *state
            .group_by_user
            .get(user_id)
            .ok_or(GroupError::NotFound)?;

        self.store.delete_membership(user_id).await?;

        let mut remaining = state
            .remove_group(&group_id)
            .map(|g| g.members)
            .unwrap_or_default();
        remaining.retain(|m| m.user_id != *user_id);

        if remaining.len() < 2 {
            if let Err(e) = self.store.delete_memberships_for_group(&group_id).await {
                if !remaining.is_empty() {
                    state.insert_group(Group {
                        id: group_id,
                        members: remaining,
                    });
                }
                return Err(e.into());
            }
            return Ok(());
        }

        let result = renumber(self.store.as_ref(), &mut remaining).await;
        state.insert_group(Group {
            id: group_id,
            members: remaining,
        });
        result.map(|_| ()).map_err(GroupError::from)
    }

    /// Delete a group and every membership in it.
    pub async fn delete_group(&self, group_id: &GroupId) -> Result<(), GroupError> {
        let mut state = self.state.write().await;
        if !state.group_by_id.contains_key(group_id) {
            return Err(GroupError::NotFound);
        }

        self.store.delete_memberships_for_group(group_id).await?;
        state.remove_group(group_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{add_users, positions, sqlite_store};
    use buylog_storage::MockStore;

    /// A group built through the cache from `users`, in order.
    async fn grouped(cache: &GroupCache, users: &[UserId]) -> GroupId {
        let group_id = cache.form_group(&users[0], &users[1]).await.unwrap();
        for user in &users[2..] {
            cache.add_member(&group_id, user).await.unwrap();
        }
        group_id
    }

    fn assert_contiguous(group: &Group) {
        assert!(
            group.has_contiguous_positions(),
            "positions not contiguous: {:?}",
            positions(&group.members)
        );
    }

    #[tokio::test]
    async fn load_mirrors_store_rows() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c", "d", "e"]).await;
        {
            let cache = GroupCache::new(store.clone());
            grouped(&cache, &u[0..3]).await;
            grouped(&cache, &u[3..5]).await;
        }

        let cache = GroupCache::load(store.clone()).await.unwrap();
        let groups = cache.groups().await;
        assert_eq!(groups.len(), 2);
        assert_eq!(
            positions(&groups[0].members),
            vec![(u[0], 1), (u[1], 2), (u[2], 3)]
        );
        assert_eq!(positions(&groups[1].members), vec![(u[3], 1), (u[4], 2)]);
        assert_eq!(
            cache.lookup_group_by_user(&u[4]).await.map(|g| g.id),
            Some(groups[1].id)
        );
    }

    #[tokio::test]
    async fn lookups_return_independent_copies() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b"]).await;
        let cache = GroupCache::new(store.clone());
        let group_id = grouped(&cache, &u).await;

        let mut copy = cache.lookup_group(&group_id).await.unwrap();
        copy.members.clear();

        assert_eq!(cache.member_count(&group_id).await, 2);
        assert_eq!(cache.lookup_group_by_user(&u[0]).await.unwrap().members.len(), 2);
    }

    #[tokio::test]
    async fn absent_group_has_zero_members() {
        let store = sqlite_store().await;
        let cache = GroupCache::new(store);
        assert_eq!(cache.member_count(&GroupId(12)).await, 0);
        assert!(cache.lookup_group(&GroupId(12)).await.is_none());
        assert!(cache.lookup_group_by_user(&UserId(3)).await.is_none());
    }

    #[tokio::test]
    async fn create_group_puts_user_at_position_one() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a"]).await;
        let cache = GroupCache::new(store.clone());

        let group_id = cache.create_group(&u[0]).await.unwrap();
        let group = cache.lookup_group(&group_id).await.unwrap();
        assert_eq!(positions(&group.members), vec![(u[0], 1)]);
        assert_eq!(store.count_members_in_group(&group_id).await.unwrap(), 1);

        assert_eq!(
            cache.create_group(&u[0]).await,
            Err(GroupError::AlreadyMember(u[0]))
        );
    }

    #[tokio::test]
    async fn add_member_appends_until_capacity() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c", "d", "e", "f"]).await;
        let cache = GroupCache::new(store.clone());
        let group_id = grouped(&cache, &u[0..5]).await;

        let group = cache.lookup_group(&group_id).await.unwrap();
        assert_eq!(group.member_count(), MAX_GROUP_MEMBERS);
        assert_contiguous(&group);

        assert_eq!(
            cache.add_member(&group_id, &u[5]).await,
            Err(GroupError::CapacityExceeded)
        );
        assert_eq!(cache.member_count(&group_id).await, 5);
        assert_eq!(store.count_members_in_group(&group_id).await.unwrap(), 5);
        assert!(cache.lookup_group_by_user(&u[5]).await.is_none());
    }

    #[tokio::test]
    async fn add_member_rejects_unknown_group_and_grouped_user() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c", "d"]).await;
        let cache = GroupCache::new(store.clone());
        let g1 = grouped(&cache, &u[0..2]).await;
        let g2 = grouped(&cache, &u[2..4]).await;

        assert_eq!(
            cache.add_member(&GroupId(999), &UserId(1234)).await,
            Err(GroupError::NotFound)
        );
        assert_eq!(
            cache.add_member(&g1, &u[2]).await,
            Err(GroupError::AlreadyMember(u[2]))
        );
        assert_eq!(cache.member_count(&g1).await, 2);
        assert_eq!(cache.member_count(&g2).await, 2);
    }

    #[tokio::test]
    async fn concurrent_adds_never_exceed_capacity() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c", "d", "e", "f", "g", "h"]).await;
        let cache = Arc::new(GroupCache::new(store.clone()));
        let group_id = grouped(&cache, &u[0..4]).await;

        let mut handles = Vec::new();
        for user in u[4..].iter().copied() {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.add_member(&group_id, &user).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => admitted += 1,
                Err(e) => assert_eq!(e, GroupError::CapacityExceeded),
            }
        }

        assert_eq!(admitted, 1);
        let group = cache.lookup_group(&group_id).await.unwrap();
        assert_eq!(group.member_count(), MAX_GROUP_MEMBERS);
        assert_contiguous(&group);
        assert_eq!(store.count_members_in_group(&group_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn leaving_middle_member_renumbers() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c"]).await;
        let cache = GroupCache::new(store.clone());
        let group_id = grouped(&cache, &u).await;

        cache.remove_member(&u[1]).await.unwrap();

        let group = cache.lookup_group(&group_id).await.unwrap();
        assert_eq!(positions(&group.members), vec![(u[0], 1), (u[2], 2)]);
        assert!(cache.lookup_group_by_user(&u[1]).await.is_none());

        // The store agrees after a reload.
        let reloaded = GroupCache::load(store.clone()).await.unwrap();
        assert_eq!(reloaded.lookup_group(&group_id).await, Some(group));
    }

    #[tokio::test]
    async fn leaving_two_member_group_dissolves_it() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b"]).await;
        let cache = GroupCache::new(store.clone());
        let group_id = grouped(&cache, &u).await;

        cache.remove_member(&u[0]).await.unwrap();

        assert!(cache.lookup_group(&group_id).await.is_none());
        assert!(cache.lookup_group_by_user(&u[0]).await.is_none());
        assert!(cache.lookup_group_by_user(&u[1]).await.is_none());
        assert_eq!(store.count_members_in_group(&group_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_member_without_group_is_not_found() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a"]).await;
        let cache = GroupCache::new(store);
        assert_eq!(cache.remove_member(&u[0]).await, Err(GroupError::NotFound));
    }

    #[tokio::test]
    async fn positions_stay_contiguous_through_adds_and_removes() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c", "d", "e", "f", "g"]).await;
        let cache = GroupCache::new(store.clone());
        let group_id = grouped(&cache, &u[0..5]).await;

        for (leaver, joiner) in [(u[0], u[5]), (u[3], u[6]), (u[5], u[0])] {
            cache.remove_member(&leaver).await.unwrap();
            assert_contiguous(&cache.lookup_group(&group_id).await.unwrap());
            cache.add_member(&group_id, &joiner).await.unwrap();
            assert_contiguous(&cache.lookup_group(&group_id).await.unwrap());
        }

        let group = cache.lookup_group(&group_id).await.unwrap();
        assert_eq!(
            group.user_ids(),
            vec![u[1], u[2], u[4], u[6], u[0]]
        );
        let reloaded = GroupCache::load(store.clone()).await.unwrap();
        assert_eq!(reloaded.lookup_group(&group_id).await, Some(group));
    }

    #[tokio::test]
    async fn delete_group_clears_every_member() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c"]).await;
        let cache = GroupCache::new(store.clone());
        let group_id = grouped(&cache, &u).await;

        cache.delete_group(&group_id).await.unwrap();

        for user in &u {
            assert!(cache.lookup_group_by_user(user).await.is_none());
        }
        assert_eq!(store.count_members_in_group(&group_id).await.unwrap(), 0);
        assert_eq!(cache.delete_group(&group_id).await, Err(GroupError::NotFound));
    }

    #[tokio::test]
    async fn form_group_rejects_grouped_users() {
        let store = sqlite_store().await;
        let u = add_users(&store, &["a", "b", "c"]).await;
        let cache = GroupCache::new(store.clone());
        grouped(&cache, &u[0..2]).await;

        assert_eq!(
            cache.form_group(&u[2], &u[1]).await,
            Err(GroupError::AlreadyMember(u[1]))
        );
        assert_eq!(
            cache.form_group(&u[2], &u[2]).await,
            Err(GroupError::AlreadyMember(u[2]))
        );
        assert!(cache.lookup_group_by_user(&u[2]).await.is_none());
    }

    // ───────────────────────────── store failures ─────────────────────────────

    fn backend_err() -> StoreError {
        StoreError::Backend("database is locked".into())
    }

    fn member(group: i64, user: i64, position: u32) -> GroupMember {
        GroupMember {
            group_id: GroupId(group),
            user_id: UserId(user),
            position,
        }
    }

    fn mock_with_rows(rows: Vec<GroupMember>) -> MockStore {
        let mut store = MockStore::new();
        store
            .expect_load_all_group_memberships()
            .returning(move || Ok(rows.clone()));
        store
    }

    #[tokio::test]
    async fn failed_create_leaves_cache_unchanged() {
        let mut store = MockStore::new();
        store
            .expect_create_group()
            .returning(|_| Err(backend_err()));
        let cache = GroupCache::new(Arc::new(store));

        assert_eq!(
            cache.create_group(&UserId(1)).await,
            Err(GroupError::Store(backend_err()))
        );
        assert!(cache.lookup_group_by_user(&UserId(1)).await.is_none());
    }

    #[tokio::test]
    async fn failed_insert_leaves_group_unchanged() {
        let mut store = mock_with_rows(vec![member(1, 10, 1), member(1, 11, 2)]);
        store
            .expect_insert_membership()
            .returning(|_| Err(backend_err()));
        let cache = GroupCache::load(Arc::new(store)).await.unwrap();

        assert_eq!(
            cache.add_member(&GroupId(1), &UserId(12)).await,
            Err(GroupError::Store(backend_err()))
        );
        assert_eq!(cache.member_count(&GroupId(1)).await, 2);
        assert!(cache.lookup_group_by_user(&UserId(12)).await.is_none());
    }

    #[tokio::test]
    async fn failed_delete_leaves_group_unchanged() {
        let mut store = mock_with_rows(vec![member(1, 10, 1), member(1, 11, 2), member(1, 12, 3)]);
        store
            .expect_delete_membership()
            .returning(|_| Err(backend_err()));
        let cache = GroupCache::load(Arc::new(store)).await.unwrap();

        assert_eq!(
            cache.remove_member(&UserId(11)).await,
            Err(GroupError::Store(backend_err()))
        );
        let group = cache.lookup_group(&GroupId(1)).await.unwrap();
        assert_eq!(group.member_count(), 3);
        assert!(group.contains(&UserId(11)));
    }

    #[tokio::test]
    async fn failed_renumber_mirrors_persisted_positions() {
        let mut store = mock_with_rows(vec![
            member(1, 10, 1),
            member(1, 11, 2),
            member(1, 12, 3),
            member(1, 13, 4),
        ]);
        store.expect_delete_membership().returning(|_| Ok(()));
        store
            .expect_update_membership_position()
            .withf(|m| m.user_id == UserId(11))
            .returning(|_| Ok(()));
        store
            .expect_update_membership_position()
            .withf(|m| m.user_id == UserId(12))
            .returning(|_| Err(backend_err()));
        let cache = GroupCache::load(Arc::new(store)).await.unwrap();

        assert_eq!(
            cache.remove_member(&UserId(10)).await,
            Err(GroupError::Store(backend_err()))
        );
        let group = cache.lookup_group(&GroupId(1)).await.unwrap();
        assert_eq!(
            positions(&group.members),
            vec![(UserId(11), 1), (UserId(12), 3), (UserId(13), 4)]
        );
        assert!(cache.lookup_group_by_user(&UserId(10)).await.is_none());
    }

    #[tokio::test]
    async fn add_member_repairs_gaps_before_appending() {
        let mut store = mock_with_rows(vec![
            member(1, 10, 1),
            member(1, 11, 2),
            member(1, 12, 3),
            member(1, 13, 4),
        ]);
        store.expect_delete_membership().returning(|_| Ok(()));
        store
            .expect_update_membership_position()
            .withf(|m| m.user_id == UserId(11))
            .times(1)
            .returning(|_| Ok(()));
        // The renumber during removal fails on 12 and leaves 12@3, 13@4; the repair succeeds.
        let mut fail = true;
        store
            .expect_update_membership_position()
            .withf(|m| m.user_id == UserId(12) && m.position == 2)
            .times(2)
            .returning(move |_| {
                if std::mem::take(&mut fail) {
                    Err(backend_err())
                } else {
                    Ok(())
                }
            });
        store
            .expect_update_membership_position()
            .withf(|m| m.user_id == UserId(13) && m.position == 3)
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_insert_membership()
            .withf(|m| m.user_id == UserId(14) && m.position == 4)
            .times(1)
            .returning(|_| Ok(()));
        let cache = GroupCache::load(Arc::new(store)).await.unwrap();

        assert!(cache.remove_member(&UserId(10)).await.is_err());
        cache.add_member(&GroupId(1), &UserId(14)).await.unwrap();

        let group = cache.lookup_group(&GroupId(1)).await.unwrap();
        assert_eq!(
            positions(&group.members),
            vec![(UserId(11), 1), (UserId(12), 2), (UserId(13), 3), (UserId(14), 4)]
        );
        assert!(group.has_contiguous_positions());
    }

    #[tokio::test]
    async fn failed_repair_rejects_the_append() {
        let mut store = mock_with_rows(vec![member(1, 10, 1), member(1, 11, 3)]);
        store
            .expect_update_membership_position()
            .returning(|_| Err(backend_err()));
        store.expect_insert_membership().never();
        let cache = GroupCache::load(Arc::new(store)).await.unwrap();

        assert_eq!(
            cache.add_member(&GroupId(1), &UserId(12)).await,
            Err(GroupError::Store(backend_err()))
        );
        let group = cache.lookup_group(&GroupId(1)).await.unwrap();
        assert_eq!(positions(&group.members), vec![(UserId(10), 1), (UserId(11), 3)]);
        assert!(cache.lookup_group_by_user(&UserId(12)).await.is_none());
    }

    #[tokio::test]
    async fn form_group_rolls_back_founder_on_failed_insert() {
        let mut store = MockStore::new();
        store.expect_create_group().returning(|_| Ok(GroupId(7)));
        store
            .expect_insert_membership()
            .returning(|_| Err(backend_err()));
        store
            .expect_delete_memberships_for_group()
            .withf(|g| *g == GroupId(7))
            .times(1)
            .returning(|_| Ok(1));
        let cache = GroupCache::new(Arc::new(store));

        assert_eq!(
            cache.form_group(&UserId(1), &UserId(2)).await,
            Err(GroupError::Store(backend_err()))
        );
        assert!(cache.lookup_group(&GroupId(7)).await.is_none());
        assert!(cache.lookup_group_by_user(&UserId(1)).await.is_none());
    }
}
