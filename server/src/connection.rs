//! Per-connection lifecycle: WebSocket upgrade, join handshake, the read
//! loop and cleanup on disconnect.

use crate::ai;
use crate::client::{ClientConnection, ConnectionError};
use crate::handler;
use crate::server::GameContext;
use futures::{Sink, Stream, StreamExt};
use log::{debug, error, info, warn};
use shared::{Envelope, Player};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use uuid::Uuid;

/// Upgrades a raw TCP stream and serves it until the client goes away.
/// Upgrade requests for any path other than `ws_path` are refused with 404.
pub async fn accept_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: GameContext,
    ws_path: String,
) {
    let check_path = |request: &Request, response: Response| {
        if request.uri().path() == ws_path {
            Ok(response)
        } else {
            debug!("Refusing upgrade on {} from {}", request.uri().path(), peer);
            let mut refusal = ErrorResponse::new(Some("not found".to_string()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };

    let ws = match accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    debug!("WebSocket connection established with {}", peer);

    let (sink, stream) = ws.split();
    serve_client(ctx, sink, stream).await;
}

/// Runs one player's session over an already upgraded socket.
pub async fn serve_client<S, R>(ctx: GameContext, sink: S, mut stream: R)
where
    S: Sink<Message, Error = WsError> + Send + 'static,
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let player_id = Uuid::new_v4().to_string();
    let player = Player::spawn(player_id.clone(), Uuid::new_v4().to_string());
    let conn = Arc::new(ClientConnection::new(player_id.clone(), sink));

    // Hold the write lock from registration until the handshake is written so
    // the join confirmation is the first thing this client sees.
    let mut writer = conn.writer().await;
    let spawn_cohort = {
        let mut store = ctx.store.write().await;
        let is_first = store.insert_player(player.clone());
        let spawn_cohort = is_first && store.enemy_count() == 0;
        store.attach_connection(Arc::clone(&conn));
        spawn_cohort
    };
    info!("Player {} connected", player_id);

    if spawn_cohort {
        info!("First player joined, spawning enemies");
        tokio::spawn(ai::spawn_initial_enemies_task(ctx.clone()));
    }

    let handshake = async {
        writer.send(&Envelope::player_join(&player)).await?;
        let snapshot = {
            let store = ctx.store.read().await;
            store.snapshot(&ctx.room)
        };
        for other in snapshot.players.iter().filter(|p| p.id != player_id) {
            writer.send(&Envelope::player_join(other)).await?;
        }
        if !spawn_cohort {
            for enemy in &snapshot.enemies {
                writer.send(&Envelope::enemy_spawn(enemy)).await?;
            }
        }
        writer.send(&Envelope::room_data(&snapshot.room)).await?;
        Ok::<(), ConnectionError>(())
    };
    let handshake_result = handshake.await;
    drop(writer);

    match handshake_result {
        Ok(()) => {
            ctx.broadcast
                .send_except(Envelope::player_join(&player), &player_id);
            read_loop(&ctx, &conn, &mut stream).await;
        }
        Err(e) => error!("Failed to send initial state to player {}: {}", player_id, e),
    }

    disconnect(&ctx, &conn).await;
}

async fn read_loop<R>(ctx: &GameContext, conn: &ClientConnection, stream: &mut R)
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => Envelope::from_text(&text),
            Ok(Message::Binary(bytes)) => Envelope::from_slice(&bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => break,
            Err(e) => {
                debug!("Read error from player {}: {}", conn.player_id(), e);
                break;
            }
        };

        match decoded {
            // Rule violations are reported to the client inside the handler
            Ok(envelope) => {
                let _ = handler::handle_message(ctx, conn, envelope).await;
            }
            Err(e) => warn!("Malformed message from player {}: {}", conn.player_id(), e),
        }
    }
}

/// Unregisters the player and tells everyone else they left.
async fn disconnect(ctx: &GameContext, conn: &ClientConnection) {
    let player_id = conn.player_id();
    let removed = {
        let mut store = ctx.store.write().await;
        let removed = store.remove_player(player_id);
        if removed.is_some() {
            ctx.broadcast.send(Envelope::player_leave(player_id));
        }
        removed
    };
    conn.close().await;

    if removed.is_some() {
        info!("Player {} disconnected", player_id);
    }
}
