//! Group registry for the initiative tracker.
//!
//! [`GroupStore`] is the single authoritative home of every combat group in
//! the process. It owns all state-changing operations and enforces who may
//! perform them: the group's DM for roster and hit-point edits, anyone for
//! joining, adding their own player character, or advancing the turn.
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← calls the store, then hands the result to the hub
//!     ↕
//! Store (this crate)  ← locking, authorization, mutation
//!     ↕
//! Model (below)  ← Group / Entity, turn-order rules
//! ```
//!
//! The store never broadcasts. Every operation returns a snapshot of the
//! group as committed, and the caller decides what to do with it.

mod code;
mod error;
mod store;

pub use code::{CODE_ALPHABET, CODE_LEN, random_code};
pub use error::StoreError;
pub use store::GroupStore;
