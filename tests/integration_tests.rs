//! Integration tests for the game server
//!
//! These tests drive the rules through the public server API and run full
//! WebSocket sessions against a server on an ephemeral port.

use assert_approx_eq::assert_approx_eq;
use futures::{SinkExt, StreamExt};
use server::broadcast::Outbound;
use server::{ai, combat, Broadcaster, EntityStore, GameError, GameServer, ServerConfig};
use shared::{Enemy, Envelope, MessageType, MovePayload, Player, Position, Room, WorldMirror};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item.envelope);
    }
    out
}

/// COMBAT RULE TESTS
mod combat_tests {
    use super::*;

    fn arena() -> (EntityStore, Broadcaster, mpsc::Receiver<Outbound>) {
        let mut store = EntityStore::new();
        store.insert_player(Player::spawn("p1", "sword"));
        store.insert_enemy(Enemy::basic("e1", "claws", Position::new(200.0, 200.0)));
        let (broadcast, rx) = Broadcaster::channel(64);
        (store, broadcast, rx)
    }

    /// A fresh warrior's first swing: damage, rage, threat and target
    #[test]
    fn first_attack_builds_rage_and_threat() {
        let (mut store, broadcast, mut rx) = arena();
        combat::apply_basic_attack(&mut store, "p1", "e1", &broadcast).unwrap();

        let player = store.player("p1").unwrap();
        assert_eq!(player.resource, 5);
        let enemy = store.enemy("e1").unwrap();
        assert_eq!(enemy.health, 45);
        assert_eq!(enemy.threat_for("p1"), 5.0);
        assert_eq!(enemy.target_id.as_deref(), Some("p1"));

        let sent = drain(&mut rx);
        assert_eq!(sent[0].kind, MessageType::PlayerUpdate);
        let announced: Player = sent[0].payload().unwrap();
        assert_eq!(announced.resource, 5);
        assert_eq!(sent[1].kind, MessageType::EnemyUpdate);
    }

    /// Critical strike below the rage cost leaves the world untouched
    #[test]
    fn critical_strike_gated_on_rage() {
        let (mut store, broadcast, mut rx) = arena();
        store.player_mut("p1").unwrap().resource = 20;

        let err = assert_err!(combat::apply_critical_strike(&mut store, "p1", "e1", &broadcast));
        assert!(matches!(err, GameError::InsufficientRage { cost: 30, .. }));
        assert_eq!(store.player("p1").unwrap().resource, 20);
        assert_eq!(store.enemy("e1").unwrap().health, 50);
        assert!(drain(&mut rx).is_empty());
    }

    /// Build rage with basic attacks, then cash it in
    #[test]
    fn rage_cycle_ends_in_kill() {
        let (mut store, broadcast, mut rx) = arena();
        for _ in 0..6 {
            combat::apply_basic_attack(&mut store, "p1", "e1", &broadcast).unwrap();
        }
        assert_eq!(store.player("p1").unwrap().resource, 30);
        assert_eq!(store.enemy("e1").unwrap().health, 20);

        combat::apply_critical_strike(&mut store, "p1", "e1", &broadcast).unwrap();
        assert_eq!(store.enemy("e1").unwrap().health, 7);
        assert_eq!(store.player("p1").unwrap().resource, 0);

        let outcome = assert_ok!(combat::apply_basic_attack(&mut store, "p1", "e1", &broadcast));
        assert!(!outcome.killed);
        let outcome = assert_ok!(combat::apply_basic_attack(&mut store, "p1", "e1", &broadcast));
        assert!(outcome.killed);
        assert_eq!(store.enemy_count(), 0);

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.kind, MessageType::EnemyUpdate);
        assert_eq!(last.data, Some(serde_json::json!({"id": "e1", "dead": true})));

        let err = combat::apply_basic_attack(&mut store, "p1", "e1", &broadcast).unwrap_err();
        assert!(matches!(err, GameError::EnemyNotFound(_)));
    }

    /// Proximity threat picks a target; damage threat takes it away
    #[test]
    fn damage_outweighs_proximity() {
        let mut store = EntityStore::new();
        let mut near = Player::spawn("b-near", "sword");
        near.set_position(Position::new(260.0, 200.0));
        store.insert_player(near);
        let mut far = Player::spawn("a-far", "sword");
        far.set_position(Position::new(700.0, 700.0));
        store.insert_player(far);
        store.insert_enemy(Enemy::basic("e1", "claws", Position::new(200.0, 200.0)));

        let (broadcast, _rx) = Broadcaster::channel(256);
        let room = Room::dungeon();
        let start = Instant::now();

        for i in 0..3u64 {
            ai::tick(&mut store, &room, start + Duration::from_millis(100 * i), &broadcast);
        }
        assert_eq!(store.enemy("e1").unwrap().target_id.as_deref(), Some("b-near"));
        let near_threat = store.enemy("e1").unwrap().threat_for("b-near");
        assert_approx_eq!(near_threat, 0.3, 1e-9);

        // The far player steps into range and lands a hit
        let enemy_pos = store.enemy("e1").unwrap().position();
        store
            .player_mut("a-far")
            .unwrap()
            .set_position(Position::new(enemy_pos.x, enemy_pos.y + 60.0));
        combat::apply_basic_attack(&mut store, "a-far", "e1", &broadcast).unwrap();
        assert_eq!(store.enemy("e1").unwrap().target_id.as_deref(), Some("a-far"));

        let mut previous = store.enemy("e1").unwrap().threat_for("b-near");
        for i in 3..8u64 {
            ai::tick(&mut store, &room, start + Duration::from_millis(100 * i), &broadcast);
            let enemy = store.enemy("e1").unwrap();
            assert_eq!(enemy.target_id.as_deref(), Some("a-far"));
            let current = enemy.threat_for("b-near");
            assert!(current >= previous);
            previous = current;
        }
    }
}

/// MOVEMENT AND COLLISION TESTS
mod movement_tests {
    use super::*;

    /// Walking diagonally into the top wall keeps the horizontal part
    #[test]
    fn diagonal_into_wall_slides() {
        let room = Room::dungeon();
        let resolved = room.resolve_move(Position::new(400.0, 30.0), Position::new(403.0, 27.0));
        assert_eq!(resolved, Position::new(403.0, 30.0));
    }

    /// Same request from the same state gives the same answer
    #[test]
    fn resolution_is_idempotent() {
        let room = Room::dungeon();
        let old = Position::new(35.0, 35.0);
        let desired = Position::new(20.0, 20.0);
        let first = room.resolve_move(old, desired);
        let second = room.resolve_move(old, desired);
        assert_eq!(first, second);
        assert_eq!(first, old);
        assert_eq!(room.resolve_move(first, desired), first);
    }

    /// Server and client prediction agree
    #[test]
    fn mirror_prediction_matches_server() {
        let room = Room::dungeon();
        let mut mirror = WorldMirror::new();
        let mut me = Player::spawn("me", "sword");
        me.set_position(Position::new(1165.0, 450.0));
        mirror.apply(&Envelope::player_join(&me)).unwrap();
        mirror.apply(&Envelope::room_data(&room)).unwrap();

        let desired = Position::new(1172.0, 455.0);
        let predicted = mirror.predict_move(desired);
        assert_eq!(predicted, Some(room.resolve_move(me.position(), desired)));
    }
}

/// WEBSOCKET SESSION TESTS
mod session_tests {
    use super::*;

    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server() -> (String, server::ShutdownTrigger) {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            shutdown_timeout_secs: 1,
            ..ServerConfig::default()
        };
        let mut game = GameServer::new(config);
        let listener = game.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let trigger = game.shutdown_trigger();
        tokio::spawn(async move {
            game.run(listener).await;
            game.shutdown().await;
        });
        (format!("ws://{}", addr), trigger)
    }

    async fn connect(base: &str) -> Socket {
        let (socket, _) = connect_async(format!("{}/ws", base)).await.unwrap();
        socket
    }

    /// Reads until an envelope of `kind` arrives, applying everything to `mirror`.
    async fn wait_for(
        socket: &mut Socket,
        mirror: &mut WorldMirror,
        kind: MessageType,
    ) -> Envelope {
        let deadline = Duration::from_secs(3);
        tokio::time::timeout(deadline, async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let envelope = Envelope::from_text(&text).unwrap();
                        mirror.apply(&envelope).unwrap();
                        if envelope.kind == kind {
                            return envelope;
                        }
                    }
                    Some(Ok(_)) => {}
                    other => panic!("connection ended while waiting for {:?}: {:?}", kind, other),
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {:?}", kind))
    }

    async fn send(socket: &mut Socket, envelope: &Envelope) {
        socket
            .send(Message::Text(envelope.to_text().unwrap()))
            .await
            .unwrap();
    }

    /// Join handshake: own player first, then room data
    #[tokio::test]
    async fn join_handshake() {
        let (base, trigger) = start_server().await;
        let mut socket = connect(&base).await;
        let mut mirror = WorldMirror::new();

        let join = wait_for(&mut socket, &mut mirror, MessageType::PlayerJoin).await;
        let me: Player = join.payload().unwrap();
        assert_eq!(me.position(), shared::DEFAULT_SPAWN);
        assert_eq!(me.health, 100);
        assert_eq!(mirror.local_player_id.as_deref(), Some(me.id.as_str()));

        wait_for(&mut socket, &mut mirror, MessageType::RoomData).await;
        assert_eq!(mirror.room.walls.len(), 4);

        // The first player gets the enemy cohort as spawn broadcasts
        for _ in 0..3 {
            wait_for(&mut socket, &mut mirror, MessageType::EnemySpawn).await;
        }
        assert_eq!(mirror.enemies.len(), 3);
        trigger.fire();
    }

    /// Movement reaches other players but is not echoed to the mover
    #[tokio::test]
    async fn movement_is_relayed_to_others() {
        let (base, trigger) = start_server().await;
        let mut alice = connect(&base).await;
        let mut alice_view = WorldMirror::new();
        wait_for(&mut alice, &mut alice_view, MessageType::RoomData).await;

        let mut bob = connect(&base).await;
        let mut bob_view = WorldMirror::new();
        let bob_join = wait_for(&mut bob, &mut bob_view, MessageType::PlayerJoin).await;
        let bob_id = bob_join.player_id.clone().unwrap();
        wait_for(&mut bob, &mut bob_view, MessageType::RoomData).await;
        assert!(bob_view.players.len() >= 2);

        // Alice hears about Bob
        let seen = wait_for(&mut alice, &mut alice_view, MessageType::PlayerJoin).await;
        assert_eq!(seen.player_id.as_deref(), Some(bob_id.as_str()));

        send(&mut bob, &Envelope::player_move(&bob_id, Position::new(405.0, 300.0))).await;
        let moved = loop {
            let env = wait_for(&mut alice, &mut alice_view, MessageType::PlayerMove).await;
            if env.player_id.as_deref() == Some(bob_id.as_str()) {
                break env;
            }
        };
        let payload: MovePayload = moved.payload().unwrap();
        assert_eq!(payload.position(), Position::new(405.0, 300.0));

        // A game state round trip proves Bob's queue held no echo of his move
        send(&mut bob, &Envelope::new(MessageType::GameState, None, None)).await;
        let mut skipped_moves = 0;
        let state = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                if let Some(Ok(Message::Text(text))) = bob.next().await {
                    let env = Envelope::from_text(&text).unwrap();
                    if env.kind == MessageType::PlayerMove
                        && env.player_id.as_deref() == Some(bob_id.as_str())
                    {
                        skipped_moves += 1;
                    }
                    if env.kind == MessageType::GameState {
                        return env;
                    }
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(skipped_moves, 0);
        let snapshot: shared::GameSnapshot = state.payload().unwrap();
        let bob_now = snapshot.players.iter().find(|p| p.id == bob_id).unwrap();
        assert_eq!(bob_now.position(), Position::new(405.0, 300.0));

        bob.close(None).await.unwrap();
        let left = wait_for(&mut alice, &mut alice_view, MessageType::PlayerLeave).await;
        assert_eq!(left.player_id.as_deref(), Some(bob_id.as_str()));
        assert!(!alice_view.players.contains_key(&bob_id));
        trigger.fire();
    }

    /// Rejected ability comes back as an error to the sender
    #[tokio::test]
    async fn rejected_critical_strike_reports_error() {
        let (base, trigger) = start_server().await;
        let mut socket = connect(&base).await;
        let mut mirror = WorldMirror::new();
        let join = wait_for(&mut socket, &mut mirror, MessageType::PlayerJoin).await;
        let me = join.player_id.unwrap();
        let spawn = wait_for(&mut socket, &mut mirror, MessageType::EnemySpawn).await;
        let enemy: Enemy = spawn.payload().unwrap();

        let action = shared::ActionPayload::new("critical_strike", Some(enemy.id.clone()));
        let request = Envelope::new(
            MessageType::PlayerAction,
            Some(me),
            Some(serde_json::to_value(action).unwrap()),
        );
        send(&mut socket, &request).await;

        wait_for(&mut socket, &mut mirror, MessageType::Error).await;
        assert_eq!(mirror.errors[0].code, "insufficient_rage");
        trigger.fire();
    }

    /// Upgrades on any other path are refused
    #[tokio::test]
    async fn wrong_path_is_refused() {
        let (base, trigger) = start_server().await;
        let result = connect_async(format!("{}/elsewhere", base)).await;
        assert!(result.is_err());
        trigger.fire();
    }
}
