//! Unified error type for the initiative server.

use initiative_hub::HubError;
use initiative_protocol::ProtocolError;
use initiative_store::StoreError;
use initiative_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum InitiativeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A store-level error (unknown group or entity, not the DM).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A broadcast could not be encoded.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// The server configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
