//! Wire protocol for the initiative tracker.
//!
//! This crate defines the messages that travel between browser clients and
//! the gateway:
//!
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`StateSnapshot`]):
//!   every frame is a JSON object `{ "type": ..., "data": ... }`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) - how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Store / Hub
//! ```

mod codec;
mod error;
mod messages;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, ServerMessage, StateSnapshot};
