//! The group store: every group in the process behind one lock.
//!
//! # Concurrency
//!
//! The whole map sits behind a single `tokio::sync::RwLock`. Mutations take
//! the write lock for lookup, authorization, mutation and re-sort, which
//! serializes writes across all groups. Lookups share the read lock.
//! Nothing is awaited while a guard is held.

use std::collections::HashMap;

use initiative_model::{Entity, EntityId, Group, roll_d20};
use tokio::sync::RwLock;

use crate::{StoreError, random_code};

/// The authoritative registry of combat groups.
///
/// Operations return an owned copy of the group as it stands right after
/// the operation; later mutations are not reflected in it.
pub struct GroupStore {
    groups: RwLock<HashMap<String, Group>>,
}

impl GroupStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the group for `code`, creating it if needed.
    ///
    /// - An empty `code` picks a fresh random code that is not in use.
    /// - A new group gets `uid` as its DM and starts in round 1.
    /// - An existing group without a DM gets `uid` as its DM.
    pub async fn get_or_create_group(&self, code: &str, uid: &str) -> Group {
        let mut groups = self.groups.write().await;

        let code = if code.is_empty() {
            loop {
                let candidate = random_code();
                if !groups.contains_key(&candidate) {
                    break candidate;
                }
                tracing::debug!(code = %candidate, "generated code in use, retrying");
            }
        } else {
            code.to_string()
        };

        let group = groups.entry(code).or_insert_with_key(|code| {
            tracing::info!(%code, dm_uid = %uid, "group created");
            Group::new(code.as_str(), uid)
        });
        if group.claim_dm(uid) {
            tracing::info!(code = %group.code(), dm_uid = %uid, "DM assigned");
        }
        group.clone()
    }

    /// Looks up a group without modifying anything.
    pub async fn get_group(&self, code: &str) -> Result<Group, StoreError> {
        self.groups
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::GroupNotFound(code.to_string()))
    }

    /// Adds a player character owned by `uid`. Open to anyone.
    ///
    /// Negative initiative is clamped to 0.
    pub async fn add_player(
        &self,
        code: &str,
        uid: &str,
        name: &str,
        initiative: i32,
        bonus: i32,
    ) -> Result<(Group, Entity), StoreError> {
        self.mutate(code, |group| {
            let entity = Entity::player(name, uid, initiative, bonus);
            group.add_entity(entity.clone());
            tracing::debug!(%code, %uid, entity_id = %entity.id(), "player added");
            Ok(entity)
        })
        .await
    }

    /// Adds a player character with initiative `d20 + bonus`.
    ///
    /// The sum saturates, so an extreme `bonus` can't overflow.
    pub async fn add_player_with_roll(
        &self,
        code: &str,
        uid: &str,
        name: &str,
        bonus: i32,
    ) -> Result<(Group, Entity), StoreError> {
        let roll = roll_d20();
        self.add_player(code, uid, name, roll.saturating_add(bonus), bonus)
            .await
    }

    /// Adds a monster at full health. DM only.
    pub async fn add_monster(
        &self,
        code: &str,
        uid: &str,
        name: &str,
        hp: i32,
        bonus: i32,
        initiative: i32,
    ) -> Result<(Group, Entity), StoreError> {
        self.mutate_as_dm(code, uid, |group| {
            let entity = Entity::monster(name, hp, bonus, initiative);
            group.add_entity(entity.clone());
            tracing::debug!(%code, entity_id = %entity.id(), "monster added");
            Ok(entity)
        })
        .await
    }

    /// Subtracts `delta` from a monster's hit points, flooring at 0. DM only.
    ///
    /// Fails with [`StoreError::EntityNotFound`] if `entity_id` names a
    /// player.
    pub async fn damage_monster(
        &self,
        code: &str,
        uid: &str,
        entity_id: EntityId,
        delta: i32,
    ) -> Result<Group, StoreError> {
        self.mutate_as_dm(code, uid, |group| {
            let monster = group
                .entity_mut(entity_id)
                .filter(|e| e.is_monster())
                .ok_or(StoreError::EntityNotFound(entity_id))?;
            monster.apply_damage(delta);
            tracing::debug!(%code, %entity_id, delta, hp = monster.hp(), "monster damaged");
            Ok(())
        })
        .await
        .map(|(group, ())| group)
    }

    /// Puts the roster in the order given. DM only.
    ///
    /// Unknown ids are ignored. Entities not listed follow the listed ones
    /// in their previous relative order.
    pub async fn reorder(
        &self,
        code: &str,
        uid: &str,
        ordered_ids: &[EntityId],
    ) -> Result<Group, StoreError> {
        self.mutate_as_dm(code, uid, |group| {
            group.reorder(ordered_ids);
            Ok(())
        })
        .await
        .map(|(group, ())| group)
    }

    /// Advances to the next turn.
    ///
    /// Unlike the other mutations this is open to every participant, so
    /// players can pass the turn themselves.
    pub async fn next_turn(&self, code: &str) -> Result<Group, StoreError> {
        self.mutate(code, |group| {
            group.advance_turn();
            tracing::debug!(%code, round = group.round(), turn = group.turn_index(), "turn advanced");
            Ok(())
        })
        .await
        .map(|(group, ())| group)
    }

    /// Clears the roster and resets to round 1, turn 0. DM only.
    pub async fn reset_initiative(&self, code: &str, uid: &str) -> Result<Group, StoreError> {
        self.mutate_as_dm(code, uid, |group| {
            group.reset();
            tracing::info!(%code, "initiative reset");
            Ok(())
        })
        .await
        .map(|(group, ())| group)
    }

    /// Removes an entity and repairs the turn pointer. DM only.
    pub async fn delete_entity(
        &self,
        code: &str,
        uid: &str,
        entity_id: EntityId,
    ) -> Result<Group, StoreError> {
        self.mutate_as_dm(code, uid, |group| {
            group
                .remove_entity(entity_id)
                .ok_or(StoreError::EntityNotFound(entity_id))?;
            tracing::debug!(%code, %entity_id, "entity deleted");
            Ok(())
        })
        .await
        .map(|(group, ())| group)
    }

    /// Renames an entity in place. DM only.
    pub async fn rename_entity(
        &self,
        code: &str,
        uid: &str,
        entity_id: EntityId,
        new_name: &str,
    ) -> Result<Group, StoreError> {
        self.mutate_entity(code, uid, entity_id, |entity| entity.rename(new_name))
            .await
    }

    /// Overwrites an entity's hit points. DM only.
    ///
    /// Each value is clamped to 0 on its own; `hp > max_hp` is allowed.
    pub async fn edit_entity_hp(
        &self,
        code: &str,
        uid: &str,
        entity_id: EntityId,
        hp: i32,
        max_hp: i32,
    ) -> Result<Group, StoreError> {
        self.mutate_entity(code, uid, entity_id, |entity| entity.set_hp(hp, max_hp))
            .await
    }

    /// Adds a status tag. Adding a tag that is already there is a no-op.
    /// DM only.
    pub async fn add_entity_tag(
        &self,
        code: &str,
        uid: &str,
        entity_id: EntityId,
        tag: &str,
    ) -> Result<Group, StoreError> {
        self.mutate_entity(code, uid, entity_id, |entity| {
            entity.add_tag(tag);
        })
        .await
    }

    /// Removes a status tag. Removing a tag that isn't there is a no-op,
    /// not an error. DM only.
    pub async fn remove_entity_tag(
        &self,
        code: &str,
        uid: &str,
        entity_id: EntityId,
        tag: &str,
    ) -> Result<Group, StoreError> {
        self.mutate_entity(code, uid, entity_id, |entity| {
            entity.remove_tag(tag);
        })
        .await
    }

    /// Returns `true` if a group with this code exists.
    pub async fn contains(&self, code: &str) -> bool {
        self.groups.read().await.contains_key(code)
    }

    /// Returns the number of groups.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    // -----------------------------------------------------------------------
    // Locking helpers
    // -----------------------------------------------------------------------

    /// Runs `op` on the group under the write lock and returns a snapshot
    /// of the group alongside `op`'s result.
    ///
    /// `op` must check everything it needs before it changes anything, so
    /// that an `Err` leaves the group untouched.
    async fn mutate<T>(
        &self,
        code: &str,
        op: impl FnOnce(&mut Group) -> Result<T, StoreError>,
    ) -> Result<(Group, T), StoreError> {
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(code)
            .ok_or_else(|| StoreError::GroupNotFound(code.to_string()))?;
        let out = op(group)?;
        Ok((group.clone(), out))
    }

    /// Like [`mutate`](Self::mutate), but rejects callers who aren't the DM
    /// before `op` runs.
    async fn mutate_as_dm<T>(
        &self,
        code: &str,
        uid: &str,
        op: impl FnOnce(&mut Group) -> Result<T, StoreError>,
    ) -> Result<(Group, T), StoreError> {
        self.mutate(code, |group| {
            if !group.is_dm(uid) {
                tracing::debug!(%code, %uid, "rejected non-DM mutation");
                return Err(StoreError::NotAuthorized(code.to_string()));
            }
            op(group)
        })
        .await
    }

    /// DM-only edit of a single entity of either kind.
    async fn mutate_entity(
        &self,
        code: &str,
        uid: &str,
        entity_id: EntityId,
        edit: impl FnOnce(&mut Entity),
    ) -> Result<Group, StoreError> {
        self.mutate_as_dm(code, uid, |group| {
            let entity = group
                .entity_mut(entity_id)
                .ok_or(StoreError::EntityNotFound(entity_id))?;
            edit(entity);
            Ok(())
        })
        .await
        .map(|(group, ())| group)
    }
}

impl Default for GroupStore {
    fn default() -> Self {
        Self::new()
    }
}
