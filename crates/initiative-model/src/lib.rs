//! Combat model for the initiative tracker.
//!
//! This crate is pure data plus the turn-order rules. It does no I/O and
//! holds no locks; the store layer wraps it with concurrency and
//! authorization.
//!
//! - [`Entity`] - one combatant (a player character or a monster)
//! - [`Group`] - one combat session: roster, round, whose turn it is
//! - [`roll_d20`] - the die used to seed a player's initiative
//!
//! # Turn order
//!
//! ```text
//! initiative (high → low) → players before monsters → name (A → Z)
//! ```

mod dice;
mod entity;
mod group;

pub use dice::roll_d20;
pub use entity::{Entity, EntityId, EntityKind};
pub use group::Group;
