//! Broadcast hub for the initiative tracker.
//!
//! The hub knows which connections follow which group and pushes a fresh
//! state snapshot to each of them after every change. What a connection
//! sees depends on who it is: the DM connection gets the full roster,
//! everyone else gets monster hit points zeroed.
//!
//! # Key types
//!
//! - [`Hub`] - subscriber registry and broadcaster
//! - [`Subscriber`] - one connection: identity, DM flag, outbound queue
//! - [`BroadcastReport`] - what happened to one broadcast
//!
//! # Backpressure
//!
//! Each subscriber owns a bounded queue. The hub never waits on it: if the
//! queue is full the message for that subscriber is dropped and logged,
//! and the other subscribers are unaffected.

mod error;
mod hub;
mod subscriber;

pub use error::HubError;
pub use hub::{BroadcastReport, Hub};
pub use subscriber::{Delivery, OutboundReceiver, Subscriber};
