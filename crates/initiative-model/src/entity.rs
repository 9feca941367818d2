//! Combatants: player characters and monsters.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an entity.
///
/// Generated once when the entity is created and never changed. On the
/// wire it is the hyphenated UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What kind of combatant an entity is. Fixed at creation.
///
/// Serialized lowercase (`"player"` / `"monster"`) to match what the
/// browser client switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Monster,
}

impl EntityKind {
    /// Tie-break rank on equal initiative: players act before monsters.
    pub(crate) fn turn_rank(self) -> u8 {
        match self {
            Self::Player => 0,
            Self::Monster => 1,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => f.write_str("player"),
            Self::Monster => f.write_str("monster"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One combatant in a group's turn order.
///
/// Hit points only mean something for monsters; players keep them at 0.
/// Both `hp` and `max_hp` are clamped to be non-negative on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    id: EntityId,
    name: String,
    #[serde(rename = "type")]
    kind: EntityKind,
    initiative: i32,
    bonus: i32,
    hp: i32,
    max_hp: i32,
    owner_uid: String,
    tags: Vec<String>,
}

impl Entity {
    /// Creates a player character owned by `owner_uid`.
    ///
    /// Negative initiative is clamped to 0.
    pub fn player(
        name: impl Into<String>,
        owner_uid: impl Into<String>,
        initiative: i32,
        bonus: i32,
    ) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            kind: EntityKind::Player,
            initiative: initiative.max(0),
            bonus,
            hp: 0,
            max_hp: 0,
            owner_uid: owner_uid.into(),
            tags: Vec::new(),
        }
    }

    /// Creates a monster at full health (`hp == max_hp`).
    ///
    /// Negative initiative and hit points are clamped to 0.
    pub fn monster(
        name: impl Into<String>,
        hp: i32,
        bonus: i32,
        initiative: i32,
    ) -> Self {
        let hp = hp.max(0);
        Self {
            id: EntityId::new(),
            name: name.into(),
            kind: EntityKind::Monster,
            initiative: initiative.max(0),
            bonus,
            hp,
            max_hp: hp,
            owner_uid: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_monster(&self) -> bool {
        self.kind == EntityKind::Monster
    }

    pub fn initiative(&self) -> i32 {
        self.initiative
    }

    pub fn bonus(&self) -> i32 {
        self.bonus
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    /// The uid of the player who added this entity. Empty for monsters.
    pub fn owner_uid(&self) -> &str {
        &self.owner_uid
    }

    /// Status conditions ("poisoned", "stunned", ...) in insertion order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Overwrites both hit point values. Each is clamped to 0 on its own;
    /// `hp` may exceed `max_hp`.
    pub fn set_hp(&mut self, hp: i32, max_hp: i32) {
        self.hp = hp.max(0);
        self.max_hp = max_hp.max(0);
    }

    /// Subtracts `delta` from `hp`, flooring at 0.
    ///
    /// A negative `delta` heals. There is no ceiling at `max_hp`.
    pub fn apply_damage(&mut self, delta: i32) {
        self.hp = self.hp.saturating_sub(delta).max(0);
    }

    /// Adds a tag. Returns `false` if it was already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Removes a tag. Returns `false` if it was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Returns the copy of this entity a non-DM viewer may see.
    ///
    /// Monsters have `hp` and `max_hp` zeroed; players pass through.
    pub fn redacted(&self) -> Self {
        let mut view = self.clone();
        if view.is_monster() {
            view.hp = 0;
            view.max_hp = 0;
        }
        view
    }
}
