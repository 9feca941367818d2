//! Integration tests for the server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use initiative::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server_with(builder: InitiativeServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(InitiativeServer::builder()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, kind: &str, data: Value) {
    let frame = json!({ "type": kind, "data": data }).to_string();
    ws.send(Message::text(frame)).await.expect("send");
}

/// Receives the next server frame as JSON.
async fn recv(ws: &mut ClientWs) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("should receive within timeout")
        .expect("stream should be open")
        .expect("frame should be valid");
    assert!(msg.is_text(), "server frames are text, got {msg:?}");
    serde_json::from_slice(&msg.into_data()).expect("frame should be JSON")
}

async fn recv_type(ws: &mut ClientWs, kind: &str) -> Value {
    let frame = recv(ws).await;
    assert_eq!(frame["type"], kind, "unexpected frame {frame}");
    frame["data"].clone()
}

/// Joins `group` as `uid`, consuming the `joined` and `state` replies.
/// Returns the `joined` payload.
async fn join(ws: &mut ClientWs, group: &str, uid: &str) -> Value {
    send(ws, "join", json!({ "group": group, "uid": uid })).await;
    let joined = recv_type(ws, "joined").await;
    recv_type(ws, "state").await;
    joined
}

/// Asserts the server hung up.
async fn assert_closed(ws: &mut ClientWs) {
    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("server should close the connection");
    match next {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("expected close, got {other:?}"),
    }
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test]
async fn test_join_without_code_creates_group_with_sender_as_dm() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, "join", json!({ "uid": "dm1" })).await;

    let joined = recv_type(&mut ws, "joined").await;
    let code = joined["group"].as_str().unwrap();
    assert_eq!(code.len(), 5);
    assert_eq!(joined["uid"], "dm1");
    assert_eq!(joined["isDm"], true);

    let state = recv_type(&mut ws, "state").await;
    assert_eq!(state["group"], code);
    assert_eq!(state["round"], 1);
    assert_eq!(state["turn"], 0);
    assert_eq!(state["dmUid"], "dm1");
    assert_eq!(state["entries"], json!([]));
}

#[tokio::test]
async fn test_second_uid_joins_as_player_and_everyone_gets_state() {
    let addr = start_server().await;
    let mut dm = connect(&addr).await;
    let mut player = connect(&addr).await;

    let code = join(&mut dm, "K7QXP", "dm1").await["group"].clone();
    assert_eq!(code, "K7QXP");

    send(&mut player, "join", json!({ "group": "K7QXP", "uid": "p1" })).await;
    let joined = recv_type(&mut player, "joined").await;
    assert_eq!(joined["isDm"], false);
    assert_eq!(recv_type(&mut player, "state").await["dmUid"], "dm1");

    // The DM hears about the new subscriber's join as well.
    assert_eq!(recv_type(&mut dm, "state").await["group"], "K7QXP");
}

#[tokio::test]
async fn test_first_frame_must_be_join() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, "next", json!({})).await;

    let error = recv_type(&mut ws, "error").await;
    assert_eq!(error["message"], "expected join");
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_join_timeout_closes_connection() {
    let addr = start_server_with(
        InitiativeServer::builder().join_timeout(Duration::from_millis(50)),
    )
    .await;
    let mut ws = connect(&addr).await;
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_join_twice_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "AAAAA", "dm1").await;

    send(&mut ws, "join", json!({ "group": "BBBBB", "uid": "dm1" })).await;
    let error = recv_type(&mut ws, "error").await;
    assert!(
        error["message"].as_str().unwrap().contains("already joined"),
        "{error}"
    );
}

// =========================================================================
// Commands
// =========================================================================

#[tokio::test]
async fn test_player_cannot_add_monster_but_dm_can() {
    let addr = start_server().await;
    let mut dm = connect(&addr).await;
    let mut player = connect(&addr).await;
    join(&mut dm, "K7QXP", "dm1").await;
    join(&mut player, "K7QXP", "p1").await;
    recv_type(&mut dm, "state").await; // player's join

    send(
        &mut player,
        "addMonster",
        json!({ "name": "Goblin", "hp": 7, "bonus": 2, "initiative": 15 }),
    )
    .await;
    let error = recv_type(&mut player, "error").await;
    assert_eq!(error["message"], "only the DM of group K7QXP may do that");

    send(
        &mut dm,
        "addMonster",
        json!({ "name": "Goblin", "hp": 7, "bonus": 2, "initiative": 15 }),
    )
    .await;

    let dm_view = recv_type(&mut dm, "state").await;
    let goblin = &dm_view["entries"][0];
    assert_eq!(goblin["name"], "Goblin");
    assert_eq!(goblin["type"], "monster");
    assert_eq!((goblin["hp"].clone(), goblin["maxHp"].clone()), (json!(7), json!(7)));

    let player_view = recv_type(&mut player, "state").await;
    let goblin = &player_view["entries"][0];
    assert_eq!(goblin["name"], "Goblin");
    assert_eq!((goblin["hp"].clone(), goblin["maxHp"].clone()), (json!(0), json!(0)));
}

#[tokio::test]
async fn test_add_player_without_initiative_rolls() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "K7QXP", "p1").await;

    send(&mut ws, "addPlayer", json!({ "name": "Aria", "bonus": 3 })).await;

    let state = recv_type(&mut ws, "state").await;
    let aria = &state["entries"][0];
    assert_eq!(aria["ownerUid"], "p1");
    assert_eq!(aria["type"], "player");
    let initiative = aria["initiative"].as_i64().unwrap();
    assert!((4..=23).contains(&initiative), "rolled {initiative}");
}

#[tokio::test]
async fn test_combat_flow_over_the_wire() {
    let addr = start_server().await;
    let mut dm = connect(&addr).await;
    join(&mut dm, "K7QXP", "dm1").await;

    send(
        &mut dm,
        "addMonster",
        json!({ "name": "Goblin", "hp": 7, "bonus": 2, "initiative": 15 }),
    )
    .await;
    let state = recv_type(&mut dm, "state").await;
    let goblin_id = state["entries"][0]["id"].clone();

    send(&mut dm, "addPlayer", json!({ "name": "Aria", "initiative": 12 })).await;
    recv_type(&mut dm, "state").await;

    send(&mut dm, "damage", json!({ "id": goblin_id, "amount": 10 })).await;
    let state = recv_type(&mut dm, "state").await;
    assert_eq!(state["entries"][0]["hp"], 0);

    send(&mut dm, "next", json!({})).await;
    assert_eq!(recv_type(&mut dm, "state").await["turn"], 1);
    send(&mut dm, "next", json!({})).await;
    let state = recv_type(&mut dm, "state").await;
    assert_eq!((state["round"].clone(), state["turn"].clone()), (json!(2), json!(0)));

    send(&mut dm, "addTag", json!({ "id": goblin_id, "tag": "prone" })).await;
    assert_eq!(recv_type(&mut dm, "state").await["entries"][0]["tags"], json!(["prone"]));

    send(&mut dm, "delete", json!({ "id": goblin_id })).await;
    let state = recv_type(&mut dm, "state").await;
    assert_eq!(state["entries"].as_array().unwrap().len(), 1);
    assert_eq!(state["entries"][0]["name"], "Aria");

    send(&mut dm, "reset", json!({})).await;
    let state = recv_type(&mut dm, "state").await;
    assert_eq!(state["entries"], json!([]));
    assert_eq!(state["round"], 1);
}

#[tokio::test]
async fn test_bad_command_gets_error_and_connection_survives() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "K7QXP", "dm1").await;

    send(&mut ws, "fireball", json!({ "radius": 20 })).await;
    let error = recv_type(&mut ws, "error").await;
    assert!(
        error["message"].as_str().unwrap().starts_with("decode failed"),
        "{error}"
    );

    send(&mut ws, "next", json!({})).await;
    recv_type(&mut ws, "state").await;
}

#[tokio::test]
async fn test_unknown_entity_is_reported_to_sender() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "K7QXP", "dm1").await;

    let id = EntityId::new();
    send(&mut ws, "rename", json!({ "id": id.to_string(), "name": "Bob" })).await;
    let error = recv_type(&mut ws, "error").await;
    assert_eq!(error["message"], format!("entity {id} not found"));
}

#[tokio::test]
async fn test_idle_timeout_closes_connection() {
    let addr = start_server_with(
        InitiativeServer::builder().idle_timeout(Duration::from_millis(50)),
    )
    .await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "K7QXP", "dm1").await;
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_inbound_commands_keep_connection_open() {
    let addr = start_server_with(
        InitiativeServer::builder().idle_timeout(Duration::from_millis(200)),
    )
    .await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "K7QXP", "dm1").await;

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        send(&mut ws, "next", json!({})).await;
        recv_type(&mut ws, "state").await;
    }
}

#[tokio::test]
async fn test_state_updates_alone_do_not_keep_a_watcher_open() {
    let addr = start_server_with(
        InitiativeServer::builder().idle_timeout(Duration::from_millis(200)),
    )
    .await;
    let mut dm = connect(&addr).await;
    let mut watcher = connect(&addr).await;
    join(&mut dm, "K7QXP", "dm1").await;
    join(&mut watcher, "K7QXP", "p1").await;

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        send(&mut dm, "next", json!({})).await;
    }

    // The watcher got updates but never spoke, so it timed out.
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), watcher.next())
            .await
            .expect("server should close the watcher");
        match next {
            Some(Ok(Message::Text(_))) => continue,
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
            Some(Ok(other)) => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_zero_capacity_is_rejected() {
    let result = InitiativeServer::builder()
        .bind("127.0.0.1:0")
        .outbound_capacity(0)
        .build()
        .await;
    assert!(matches!(result, Err(InitiativeError::Config(_))));
}
