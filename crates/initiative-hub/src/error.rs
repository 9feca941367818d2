//! Error types for the hub.

use initiative_protocol::ProtocolError;

/// Errors that can occur while broadcasting.
///
/// Slow or closed subscribers are not errors; they show up in the
/// [`BroadcastReport`](crate::BroadcastReport) and the logs.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A snapshot could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
