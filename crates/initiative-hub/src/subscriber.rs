//! One subscribed connection and its outbound queue.

use initiative_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Receiving end of a subscriber's outbound queue. The connection's writer
/// task drains it onto the socket.
pub type OutboundReceiver = mpsc::Receiver<Vec<u8>>;

/// What happened to one message offered to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the writer.
    Queued,
    /// The queue was full; the message was dropped.
    Dropped,
    /// The receiving side is gone (connection closing).
    Closed,
}

/// A connection registered with the hub.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    uid: String,
    is_dm: bool,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl Subscriber {
    /// Wraps an existing outbound sender.
    pub fn new(
        id: ConnectionId,
        uid: impl Into<String>,
        is_dm: bool,
        outbound: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            uid: uid.into(),
            is_dm,
            outbound,
        }
    }

    /// Creates a subscriber with a fresh bounded queue of `capacity`
    /// messages and returns the queue's receiving end.
    ///
    /// # Panics
    /// Panics if `capacity` is 0 (a `tokio::sync::mpsc` requirement).
    pub fn channel(
        id: ConnectionId,
        uid: impl Into<String>,
        is_dm: bool,
        capacity: usize,
    ) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(id, uid, is_dm, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Whether this is the DM's connection (sees unredacted state).
    pub fn is_dm(&self) -> bool {
        self.is_dm
    }

    /// Offers `frame` to the queue without waiting.
    pub(crate) fn offer(&self, frame: Vec<u8>) -> Delivery {
        match self.outbound.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
