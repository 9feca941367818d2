//! Per-connection handler: join handshake and command routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `join` → look up or create the group, work out DM status
//!   2. Subscribe to the hub and start the writer task
//!   3. Queue `joined`, broadcast the group's state
//!   4. Loop: receive commands → apply to the store → broadcast or reply
//!      with an error

use std::sync::Arc;

use initiative_hub::{OutboundReceiver, Subscriber};
use initiative_model::Group;
use initiative_protocol::{ClientMessage, Codec, ProtocolError, ServerMessage};
use initiative_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::task::JoinHandle;

use crate::InitiativeError;
use crate::server::ServerState;

/// Drop guard that takes a connection out of the hub when the handler
/// exits, even on panic.
///
/// `Drop` is synchronous, so the unsubscribe runs in a fire-and-forget task.
struct SubscriptionGuard<C: Codec> {
    code: String,
    conn_id: ConnectionId,
    writer: JoinHandle<()>,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for SubscriptionGuard<C> {
    fn drop(&mut self) {
        self.writer.abort();
        let code = std::mem::take(&mut self.code);
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.hub.unsubscribe(&code, conn_id).await;
        });
    }
}

/// Who sent the `join` and for which group.
struct JoinRequest {
    group: String,
    uid: String,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), InitiativeError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(connection_id = %conn_id, "handling new connection");

    // --- Step 1: Join ---
    let JoinRequest { group, uid } = receive_join(&conn, &state).await?;

    let group = state.store.get_or_create_group(&group, &uid).await;
    let code = group.code().to_string();
    let is_dm = group.is_dm(&uid);
    tracing::info!(connection_id = %conn_id, %code, %uid, is_dm, "connection joined group");

    // --- Step 2: Subscribe and start writing ---
    let (subscriber, outbound) =
        Subscriber::channel(conn_id, uid.as_str(), is_dm, state.config.outbound_capacity);
    state.hub.subscribe(&code, subscriber).await;

    let writer = tokio::spawn(write_outbound(Arc::clone(&conn), outbound));
    let _guard = SubscriptionGuard {
        code: code.clone(),
        conn_id,
        writer,
        state: Arc::clone(&state),
    };

    // --- Step 3: Acknowledge and send the current state ---
    let joined = ServerMessage::Joined {
        group: code.clone(),
        uid: uid.clone(),
        is_dm,
    };
    state.hub.send_to(conn_id, &joined).await?;
    state.hub.broadcast_state(&group).await?;

    // --- Step 4: Command loop ---
    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(connection_id = %conn_id, %code, %uid, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(connection_id = %conn_id, %code, %uid, "connection idle, closing");
                break;
            }
        };

        let command: ClientMessage = match state.codec.decode(&data) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(connection_id = %conn_id, error = %e, "failed to decode command");
                reply_error(&state, conn_id, &e.to_string()).await?;
                continue;
            }
        };

        match apply_command(&state, &code, &uid, command).await {
            Ok(group) => {
                state.hub.broadcast_state(&group).await?;
            }
            Err(e) => {
                tracing::debug!(connection_id = %conn_id, %code, %uid, error = %e, "command rejected");
                reply_error(&state, conn_id, &e.to_string()).await?;
            }
        }
    }

    // _guard drops here → writer stops, hub forgets the connection.
    Ok(())
}

/// Waits for the first frame, which must be a `join`.
///
/// Anything else is answered with an error envelope, written straight to
/// the socket since the connection has no hub queue yet.
async fn receive_join<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
) -> Result<JoinRequest, InitiativeError> {
    let data = match tokio::time::timeout(state.config.join_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before join".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(InitiativeError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("join timed out".into()).into());
        }
    };

    match state.codec.decode::<ClientMessage>(&data) {
        Ok(ClientMessage::Join { group, uid }) => Ok(JoinRequest {
            group: group.trim().to_uppercase(),
            uid,
        }),
        Ok(_) => {
            send_direct(conn, &state.codec, "expected join").await?;
            Err(ProtocolError::InvalidMessage("first message must be join".into()).into())
        }
        Err(e) => {
            send_direct(conn, &state.codec, &e.to_string()).await?;
            Err(e.into())
        }
    }
}

/// Applies one command on behalf of `uid` and returns the group's new state.
async fn apply_command<C: Codec>(
    state: &ServerState<C>,
    code: &str,
    uid: &str,
    command: ClientMessage,
) -> Result<Group, InitiativeError> {
    let store = &state.store;
    let group = match command {
        ClientMessage::Join { .. } => {
            return Err(ProtocolError::InvalidMessage("already joined a group".into()).into());
        }
        ClientMessage::AddPlayer {
            name,
            initiative: Some(initiative),
            bonus,
        } => store.add_player(code, uid, &name, initiative, bonus).await?.0,
        ClientMessage::AddPlayer {
            name,
            initiative: None,
            bonus,
        }
        | ClientMessage::RollPlayer { name, bonus } => {
            store.add_player_with_roll(code, uid, &name, bonus).await?.0
        }
        ClientMessage::AddMonster {
            name,
            hp,
            bonus,
            initiative,
        } => store.add_monster(code, uid, &name, hp, bonus, initiative).await?.0,
        ClientMessage::Damage { id, amount } => store.damage_monster(code, uid, id, amount).await?,
        ClientMessage::Reorder { order } => store.reorder(code, uid, &order).await?,
        ClientMessage::Next {} => store.next_turn(code).await?,
        ClientMessage::Reset {} => store.reset_initiative(code, uid).await?,
        ClientMessage::Delete { id } => store.delete_entity(code, uid, id).await?,
        ClientMessage::Rename { id, name } => store.rename_entity(code, uid, id, &name).await?,
        ClientMessage::EditHp { id, hp, max_hp } => {
            store.edit_entity_hp(code, uid, id, hp, max_hp).await?
        }
        ClientMessage::AddTag { id, tag } => store.add_entity_tag(code, uid, id, &tag).await?,
        ClientMessage::RemoveTag { id, tag } => {
            store.remove_entity_tag(code, uid, id, &tag).await?
        }
    };
    Ok(group)
}

/// Drains a connection's outbound queue onto its socket until the queue
/// closes or the socket fails.
async fn write_outbound(conn: Arc<WebSocketConnection>, mut outbound: OutboundReceiver) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(connection_id = %conn.id(), error = %e, "write failed, stopping writer");
            break;
        }
    }
}

/// Queues an error envelope for one connection.
async fn reply_error<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    message: &str,
) -> Result<(), InitiativeError> {
    let error = ServerMessage::Error {
        message: message.to_string(),
    };
    state.hub.send_to(conn_id, &error).await?;
    Ok(())
}

/// Writes an error envelope straight to the socket.
async fn send_direct(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    message: &str,
) -> Result<(), InitiativeError> {
    let bytes = codec.encode(&ServerMessage::Error {
        message: message.to_string(),
    })?;
    conn.send(&bytes).await?;
    Ok(())
}
