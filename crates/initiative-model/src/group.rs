//! A combat session: roster, round counter, and turn pointer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Entity, EntityId};

/// One combat session, keyed by a short join code.
///
/// ## Invariants
///
/// - `entities` is in turn order, not insertion order.
/// - `turn_index` is in `0..entities.len()` when the roster is non-empty,
///   and 0 when it is empty.
/// - `dm_uid` never changes once it is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    code: String,
    created_at: DateTime<Utc>,
    dm_uid: String,
    round: u32,
    turn_index: usize,
    entities: Vec<Entity>,
}

impl Group {
    /// Creates an empty group in round 1 with `dm_uid` as its DM.
    pub fn new(code: impl Into<String>, dm_uid: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            created_at: Utc::now(),
            dm_uid: dm_uid.into(),
            round: 1,
            turn_index: 0,
            entities: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn dm_uid(&self) -> &str {
        &self.dm_uid
    }

    /// Current round. Both 0 and 1 mean "first round".
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    /// The roster in turn order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns `true` if `uid` is this group's DM.
    ///
    /// An empty uid is never the DM, even when no DM has been assigned.
    pub fn is_dm(&self, uid: &str) -> bool {
        !uid.is_empty() && self.dm_uid == uid
    }

    /// Assigns `uid` as DM if the group has none yet.
    ///
    /// Returns `true` if the assignment happened.
    pub fn claim_dm(&mut self, uid: &str) -> bool {
        if !self.dm_uid.is_empty() || uid.is_empty() {
            return false;
        }
        self.dm_uid = uid.to_string();
        true
    }

    /// The entity whose turn it is, if the roster is non-empty.
    pub fn active_entity(&self) -> Option<&Entity> {
        self.entities.get(self.turn_index)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    /// Adds an entity to the roster and re-derives turn order.
    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
        self.sort_order();
    }

    /// Re-derives turn order.
    ///
    /// Initiative descending; on a tie players go before monsters; any
    /// remaining tie is broken by name ascending. `sort_by` is stable, so
    /// entries equal on all three keys keep their relative order.
    pub fn sort_order(&mut self) {
        self.entities.sort_by(|a, b| {
            b.initiative()
                .cmp(&a.initiative())
                .then_with(|| a.kind().turn_rank().cmp(&b.kind().turn_rank()))
                .then_with(|| a.name().cmp(b.name()))
        });
    }

    /// Moves the turn pointer to the next entity.
    ///
    /// Wrapping past the end starts a new round. An empty roster resets to
    /// round 1, turn 0.
    pub fn advance_turn(&mut self) {
        if self.entities.is_empty() {
            self.turn_index = 0;
            self.round = 1;
            return;
        }
        self.turn_index += 1;
        if self.turn_index >= self.entities.len() {
            self.turn_index = 0;
            self.round = self.round.max(1) + 1;
        }
    }

    /// Removes an entity and repairs the turn pointer.
    ///
    /// Removing an entity before the active one shifts the pointer back so
    /// it keeps pointing at the same combatant. If the pointer ends up past
    /// the end of the roster it wraps to 0.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id() == id)?;
        let removed = self.entities.remove(index);
        if self.turn_index > index {
            self.turn_index -= 1;
        } else if self.turn_index >= self.entities.len() {
            self.turn_index = 0;
        }
        Some(removed)
    }

    /// Rebuilds the roster in a caller-chosen order.
    ///
    /// Entities named in `order` come first, in that order. Unknown ids and
    /// repeats are skipped. Entities not named keep their previous relative
    /// order and follow after. Turn order is not re-sorted afterwards.
    pub fn reorder(&mut self, order: &[EntityId]) {
        let mut remaining: Vec<Option<Entity>> =
            self.entities.drain(..).map(Some).collect();
        let mut reordered = Vec::with_capacity(remaining.len());

        for id in order {
            let slot = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|e| e.id() == *id));
            if let Some(entity) = slot.and_then(Option::take) {
                reordered.push(entity);
            }
        }
        reordered.extend(remaining.into_iter().flatten());

        self.entities = reordered;
        if self.turn_index >= self.entities.len() {
            self.turn_index = 0;
        }
    }

    /// Clears the roster and starts over at round 1, turn 0.
    ///
    /// The code, creation time and DM are kept.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.round = 1;
        self.turn_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityKind;

    fn names(group: &Group) -> Vec<&str> {
        group.entities().iter().map(Entity::name).collect()
    }

    fn ids(group: &Group) -> Vec<EntityId> {
        group.entities().iter().map(Entity::id).collect()
    }

    fn roster(n: usize) -> Group {
        let mut g = Group::new("ABCDE", "dm");
        for i in 0..n {
            g.add_entity(Entity::player(format!("p{i}"), "u", 20 - i as i32, 0));
        }
        g
    }

    #[test]
    fn test_new_group_starts_in_round_one() {
        let g = Group::new("ABCDE", "dm1");
        assert_eq!(g.code(), "ABCDE");
        assert_eq!(g.dm_uid(), "dm1");
        assert_eq!(g.round(), 1);
        assert_eq!(g.turn_index(), 0);
        assert!(g.entities().is_empty());
        assert!(g.active_entity().is_none());
    }

    #[test]
    fn test_is_dm_and_claim_dm() {
        let mut g = Group::new("ABCDE", "");
        assert!(!g.is_dm(""));
        assert!(g.claim_dm("dm1"));
        assert!(!g.claim_dm("dm2"));
        assert!(g.is_dm("dm1"));
        assert!(!g.is_dm("dm2"));
    }

    #[test]
    fn test_sort_order_initiative_descending() {
        let mut g = Group::new("ABCDE", "dm");
        g.add_entity(Entity::player("low", "u", 3, 0));
        g.add_entity(Entity::monster("high", 5, 0, 18));
        g.add_entity(Entity::player("mid", "u", 10, 0));
        assert_eq!(names(&g), ["high", "mid", "low"]);
    }

    #[test]
    fn test_sort_order_players_before_monsters_on_tie() {
        let mut g = Group::new("ABCDE", "dm");
        g.add_entity(Entity::monster("Aardvark", 5, 0, 12));
        g.add_entity(Entity::player("Zed", "u", 12, 0));
        g.add_entity(Entity::monster("Bat", 5, 0, 12));
        g.add_entity(Entity::player("Aria", "u", 12, 0));
        assert_eq!(names(&g), ["Aria", "Zed", "Aardvark", "Bat"]);
    }

    #[test]
    fn test_sort_order_is_idempotent() {
        let mut g = Group::new("ABCDE", "dm");
        for (name, init) in [("c", 5), ("a", 5), ("b", 9), ("d", 1)] {
            g.add_entity(Entity::monster(name, 1, 0, init));
        }
        let first = ids(&g);
        g.sort_order();
        assert_eq!(ids(&g), first);
    }

    #[test]
    fn test_sorted_roster_satisfies_ordering_property() {
        let mut g = Group::new("ABCDE", "dm");
        let mut n = 0;
        for init in [4, 9, 4, 0, 9, 4, 17] {
            n += 1;
            g.add_entity(Entity::monster(format!("m{}", 10 - n), 1, 0, init));
            g.add_entity(Entity::player(format!("p{n}"), "u", init, 0));
        }
        for pair in g.entities().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.initiative() >= b.initiative());
            if a.initiative() == b.initiative() {
                assert!(
                    !(a.kind() == EntityKind::Monster
                        && b.kind() == EntityKind::Player)
                );
                if a.kind() == b.kind() {
                    assert!(a.name() <= b.name());
                }
            }
        }
    }

    #[test]
    fn test_advance_turn_on_empty_roster_resets() {
        let mut g = Group::new("ABCDE", "dm");
        g.advance_turn();
        assert_eq!((g.round(), g.turn_index()), (1, 0));
        g.advance_turn();
        assert_eq!((g.round(), g.turn_index()), (1, 0));
    }

    #[test]
    fn test_advance_turn_full_cycle_bumps_round_once() {
        let mut g = roster(4);
        for _ in 0..4 {
            g.advance_turn();
        }
        assert_eq!((g.round(), g.turn_index()), (2, 0));
        for _ in 0..4 {
            g.advance_turn();
        }
        assert_eq!((g.round(), g.turn_index()), (3, 0));
    }

    #[test]
    fn test_advance_turn_normalizes_round_zero() {
        let mut g: Group = serde_json::from_value(serde_json::json!({
            "code": "ABCDE",
            "createdAt": "2024-01-01T00:00:00Z",
            "dmUid": "dm",
            "round": 0,
            "turnIndex": 0,
            "entities": [],
        }))
        .unwrap();
        g.add_entity(Entity::player("solo", "u", 10, 0));
        g.advance_turn();
        assert_eq!((g.round(), g.turn_index()), (2, 0));
    }

    #[test]
    fn test_remove_before_active_shifts_pointer_back() {
        let mut g = roster(4);
        g.advance_turn();
        g.advance_turn();
        let active = g.active_entity().unwrap().id();
        let first = g.entities()[0].id();

        g.remove_entity(first).unwrap();
        assert_eq!(g.turn_index(), 1);
        assert_eq!(g.active_entity().unwrap().id(), active);
    }

    #[test]
    fn test_remove_active_keeps_index_on_next_entity() {
        let mut g = roster(4);
        g.advance_turn();
        let next = g.entities()[2].id();
        let active = g.active_entity().unwrap().id();

        g.remove_entity(active).unwrap();
        assert_eq!(g.turn_index(), 1);
        assert_eq!(g.active_entity().unwrap().id(), next);
    }

    #[test]
    fn test_remove_last_active_wraps_to_zero() {
        let mut g = roster(3);
        g.advance_turn();
        g.advance_turn();
        let last = g.active_entity().unwrap().id();

        g.remove_entity(last).unwrap();
        assert_eq!(g.turn_index(), 0);
    }

    #[test]
    fn test_remove_only_entity_leaves_empty_roster_at_zero() {
        let mut g = roster(1);
        let only = g.entities()[0].id();
        assert!(g.remove_entity(only).is_some());
        assert!(g.entities().is_empty());
        assert_eq!(g.turn_index(), 0);
    }

    #[test]
    fn test_remove_unknown_returns_none() {
        let mut g = roster(2);
        assert!(g.remove_entity(EntityId::new()).is_none());
        assert_eq!(g.entities().len(), 2);
    }

    #[test]
    fn test_reorder_places_listed_then_remaining_in_prior_order() {
        let mut g = roster(4);
        let before = ids(&g);

        g.reorder(&[before[3], EntityId::new(), before[1], before[3]]);
        assert_eq!(ids(&g), [before[3], before[1], before[0], before[2]]);
    }

    #[test]
    fn test_reorder_with_empty_list_is_noop() {
        let mut g = roster(3);
        let before = ids(&g);
        g.reorder(&[]);
        assert_eq!(ids(&g), before);
    }

    #[test]
    fn test_reset_clears_roster_but_keeps_identity() {
        let mut g = roster(3);
        g.advance_turn();
        g.advance_turn();
        g.advance_turn();
        g.reset();
        assert!(g.entities().is_empty());
        assert_eq!((g.round(), g.turn_index()), (1, 0));
        assert_eq!(g.code(), "ABCDE");
        assert_eq!(g.dm_uid(), "dm");
    }
}
