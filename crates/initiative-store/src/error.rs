//! Error types for the store layer.

use initiative_model::EntityId;

/// Errors returned by [`GroupStore`](crate::GroupStore) operations.
///
/// A failed operation never leaves a partial change behind: lookups and
/// the DM check happen before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No group exists with this code.
    #[error("group {0} not found")]
    GroupNotFound(String),

    /// No entity with this id, or the entity is the wrong kind for the
    /// operation (e.g. damaging a player).
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// The caller is not the DM of this group.
    #[error("only the DM of group {0} may do that")]
    NotAuthorized(String),
}
