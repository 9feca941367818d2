//! Subscriber registry and state broadcast.

use std::collections::{HashMap, HashSet};

use initiative_model::Group;
use initiative_protocol::{Codec, JsonCodec, ServerMessage, StateSnapshot};
use initiative_transport::ConnectionId;
use tokio::sync::RwLock;

use crate::{Delivery, HubError, Subscriber};

/// Outcome of one [`Hub::broadcast_state`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers whose queue accepted the snapshot.
    pub delivered: usize,
    /// Subscribers skipped because their queue was full.
    pub dropped: usize,
    /// Subscribers whose connection is already closing.
    pub closed: usize,
}

/// Who is subscribed to what.
///
/// Group membership is a set of connection ids per code; the subscribers
/// themselves live in a separate map keyed by the same ids. A connection
/// follows at most one group.
#[derive(Default)]
struct Registry {
    groups: HashMap<String, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, (String, Subscriber)>,
}

impl Registry {
    /// Removes `id` from `code`'s member set, dropping the set once empty.
    fn leave(&mut self, code: &str, id: ConnectionId) {
        if let Some(members) = self.groups.get_mut(code) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(code);
            }
        }
    }
}

/// Fans state snapshots out to every connection following a group.
///
/// The registry has its own `RwLock`, independent of the store's.
/// Broadcasting only takes the shared lock; subscribe/unsubscribe take the
/// exclusive one briefly.
pub struct Hub<C: Codec = JsonCodec> {
    registry: RwLock<Registry>,
    codec: C,
}

impl Hub<JsonCodec> {
    /// Creates an empty hub speaking JSON.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl Default for Hub<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> Hub<C> {
    /// Creates an empty hub that encodes with `codec`.
    pub fn with_codec(codec: C) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            codec,
        }
    }

    /// Registers `subscriber` as a follower of group `code`.
    ///
    /// If the connection already followed another group it is moved.
    pub async fn subscribe(&self, code: &str, subscriber: Subscriber) {
        let id = subscriber.id();
        let mut registry = self.registry.write().await;

        if let Some((previous, _)) = registry.connections.remove(&id) {
            registry.leave(&previous, id);
        }
        registry
            .groups
            .entry(code.to_string())
            .or_default()
            .insert(id);
        tracing::info!(
            %code,
            connection_id = %id,
            uid = %subscriber.uid(),
            is_dm = subscriber.is_dm(),
            subscribers = registry.groups[code].len(),
            "subscriber joined"
        );
        registry
            .connections
            .insert(id, (code.to_string(), subscriber));
    }

    /// Removes a connection from group `code`.
    ///
    /// Removing the last subscriber drops the group's entry from the
    /// registry. The combat group itself is not touched. Returns `false`
    /// if the connection was not subscribed to `code`.
    pub async fn unsubscribe(&self, code: &str, id: ConnectionId) -> bool {
        let mut registry = self.registry.write().await;

        let follows_code = matches!(
            registry.connections.get(&id),
            Some((current, _)) if current == code
        );
        if !follows_code {
            return false;
        }
        registry.connections.remove(&id);
        registry.leave(code, id);
        tracing::info!(%code, connection_id = %id, "subscriber left");
        true
    }

    /// Pushes the current state of `group` to everyone following it.
    ///
    /// DM subscribers get the full snapshot; all others get the redacted
    /// one. Each variant is encoded at most once. Never waits on a slow
    /// subscriber.
    pub async fn broadcast_state(&self, group: &Group) -> Result<BroadcastReport, HubError> {
        let code = group.code();
        let registry = self.registry.read().await;
        let mut report = BroadcastReport::default();

        let Some(members) = registry.groups.get(code) else {
            return Ok(report);
        };

        let mut full: Option<Vec<u8>> = None;
        let mut redacted: Option<Vec<u8>> = None;

        for id in members {
            let Some((_, subscriber)) = registry.connections.get(id) else {
                continue;
            };

            let slot = if subscriber.is_dm() { &mut full } else { &mut redacted };
            if slot.is_none() {
                let snapshot = StateSnapshot::for_viewer(group, subscriber.is_dm());
                *slot = Some(self.codec.encode(&ServerMessage::State(snapshot))?);
            }
            let Some(frame) = slot.clone() else {
                continue;
            };

            match subscriber.offer(frame) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Dropped => {
                    report.dropped += 1;
                    tracing::warn!(
                        %code,
                        connection_id = %id,
                        uid = %subscriber.uid(),
                        "slow subscriber, dropping state update"
                    );
                }
                Delivery::Closed => {
                    report.closed += 1;
                    tracing::debug!(%code, connection_id = %id, "subscriber queue closed");
                }
            }
        }

        tracing::debug!(
            %code,
            round = group.round(),
            turn = group.turn_index(),
            delivered = report.delivered,
            dropped = report.dropped,
            "state broadcast"
        );
        Ok(report)
    }

    /// Sends one message to a single connection, with the same
    /// never-wait policy as [`broadcast_state`](Self::broadcast_state).
    ///
    /// Returns `None` if the connection is not registered.
    pub async fn send_to(
        &self,
        id: ConnectionId,
        message: &ServerMessage,
    ) -> Result<Option<Delivery>, HubError> {
        let registry = self.registry.read().await;
        let Some((_, subscriber)) = registry.connections.get(&id) else {
            return Ok(None);
        };
        let delivery = subscriber.offer(self.codec.encode(message)?);
        if delivery == Delivery::Dropped {
            tracing::warn!(connection_id = %id, "slow subscriber, dropping direct message");
        }
        Ok(Some(delivery))
    }

    /// Number of connections following `code`.
    pub async fn subscriber_count(&self, code: &str) -> usize {
        self.registry
            .read()
            .await
            .groups
            .get(code)
            .map_or(0, HashSet::len)
    }

    /// Number of groups with at least one subscriber.
    pub async fn group_count(&self) -> usize {
        self.registry.read().await.groups.len()
    }
}
