//! # Initiative
//!
//! Real-time initiative tracker for tabletop RPG combat.
//!
//! A DM opens a group, players join it with the group's code, and
//! everyone's browser shows the same turn order. Every change is pushed to
//! all connected clients over WebSockets. Players see monsters without
//! their hit points.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use initiative::prelude::*;
//!
//! # async fn run() -> Result<(), InitiativeError> {
//! let server = InitiativeServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::InitiativeError;
pub use server::{InitiativeServer, InitiativeServerBuilder};

/// Everything needed to embed the server or talk to it.
pub mod prelude {
    pub use crate::{InitiativeError, InitiativeServer, InitiativeServerBuilder, ServerConfig};
    pub use initiative_hub::{BroadcastReport, Hub};
    pub use initiative_model::{Entity, EntityId, EntityKind, Group};
    pub use initiative_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage, StateSnapshot};
    pub use initiative_store::{GroupStore, StoreError};
}
