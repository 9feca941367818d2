//! Messages exchanged between clients and the gateway.
//!
//! Every frame in both directions is adjacently tagged:
//!
//! ```text
//! { "type": "addMonster", "data": { "name": "Goblin", "hp": 7, ... } }
//! ```
//!
//! which is what the browser client builds with `wsSend(type, data)`.

use initiative_model::{Entity, EntityId, Group};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StateSnapshot - what a viewer sees
// ---------------------------------------------------------------------------

/// A rendered view of a group's state for one viewer.
///
/// DM viewers get [`StateSnapshot::full`]; everyone else gets
/// [`StateSnapshot::redacted`], where monster hit points are zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// The group's join code.
    pub group: String,
    pub round: u32,
    /// Index into `entries` of the active entity.
    pub turn: usize,
    #[serde(rename = "dmUid")]
    pub dm_uid: String,
    /// The roster in turn order.
    pub entries: Vec<Entity>,
}

impl StateSnapshot {
    /// The unredacted view, for the DM.
    pub fn full(group: &Group) -> Self {
        Self::with_entries(group, group.entities().to_vec())
    }

    /// The player view: monsters report `hp = maxHp = 0`.
    pub fn redacted(group: &Group) -> Self {
        Self::with_entries(
            group,
            group.entities().iter().map(Entity::redacted).collect(),
        )
    }

    /// Picks [`full`](Self::full) or [`redacted`](Self::redacted).
    pub fn for_viewer(group: &Group, is_dm: bool) -> Self {
        if is_dm {
            Self::full(group)
        } else {
            Self::redacted(group)
        }
    }

    fn with_entries(group: &Group, entries: Vec<Entity>) -> Self {
        Self {
            group: group.code().to_string(),
            round: group.round(),
            turn: group.turn_index(),
            dm_uid: group.dm_uid().to_string(),
            entries,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage - server → client
// ---------------------------------------------------------------------------

/// Messages the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Current state of the client's group. Sent after every successful
    /// mutation and once right after joining.
    State(StateSnapshot),

    /// Acknowledges a `join`: which group the connection ended up in
    /// (useful when the client asked for a fresh code) and whether it is
    /// the DM connection.
    Joined {
        group: String,
        uid: String,
        #[serde(rename = "isDm")]
        is_dm: bool,
    },

    /// A command from this client was rejected.
    Error { message: String },
}

// ---------------------------------------------------------------------------
// ClientMessage - client → server
// ---------------------------------------------------------------------------

/// Commands a client can send.
///
/// `join` must be the first frame on a connection. Everything after that
/// applies to the joined group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Join (or create) a group. An empty `group` asks for a fresh code.
    Join {
        #[serde(default)]
        group: String,
        uid: String,
    },

    /// Add a player character owned by the sender. Without an explicit
    /// initiative the server rolls a d20 and adds `bonus`.
    AddPlayer {
        name: String,
        #[serde(default)]
        initiative: Option<i32>,
        #[serde(default)]
        bonus: i32,
    },

    /// Add a player character with rolled initiative.
    RollPlayer {
        name: String,
        #[serde(default)]
        bonus: i32,
    },

    AddMonster {
        name: String,
        hp: i32,
        #[serde(default)]
        bonus: i32,
        #[serde(default)]
        initiative: i32,
    },

    /// Subtract `amount` from a monster's hit points (negative heals).
    Damage { id: EntityId, amount: i32 },

    /// Put the roster in this order.
    Reorder { order: Vec<EntityId> },

    /// Advance to the next turn.
    Next {},

    /// Clear the roster and start over.
    Reset {},

    Delete { id: EntityId },

    Rename { id: EntityId, name: String },

    EditHp {
        id: EntityId,
        hp: i32,
        #[serde(rename = "maxHp")]
        max_hp: i32,
    },

    AddTag { id: EntityId, tag: String },

    RemoveTag { id: EntityId, tag: String },
}
