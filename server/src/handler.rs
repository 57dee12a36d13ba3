use crate::client::ClientConnection;
use crate::combat::{self, AttackOutcome};
use crate::error::GameError;
use crate::server::GameContext;
use log::{debug, info, warn};
use shared::{Action, ActionPayload, Envelope, MessageType, MovePayload, Position};

/// What a successfully handled message did, for callers that care.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Moved { resolved: Position, corrected: bool },
    Attacked(AttackOutcome),
    Relayed(String),
    SnapshotSent,
}

/// Dispatches one decoded client message. Rule violations are answered
/// with an `error` envelope to the sender only; nothing else is affected.
pub async fn handle_message(
    ctx: &GameContext,
    conn: &ClientConnection,
    envelope: Envelope,
) -> Result<Handled, GameError> {
    let result = match envelope.kind {
        MessageType::PlayerMove => handle_move(ctx, conn, &envelope).await,
        MessageType::PlayerAction => handle_action(ctx, conn.player_id(), &envelope).await,
        MessageType::GameState => send_snapshot(ctx, conn).await,
        other => Err(GameError::UnsupportedMessage(format!("{:?}", other))),
    };

    if let Err(e) = &result {
        report(conn, e).await;
    }
    result
}

async fn report(conn: &ClientConnection, error: &GameError) {
    match error {
        GameError::MalformedPayload { .. } | GameError::UnsupportedMessage(_) => {
            warn!("Dropped message from player {}: {}", conn.player_id(), error)
        }
        _ => info!("Rejected request from player {}: {}", conn.player_id(), error),
    }
    let reply = Envelope::error(conn.player_id(), error.to_payload());
    if let Err(e) = conn.send(&reply).await {
        debug!("Could not report error to player {}: {}", conn.player_id(), e);
    }
}

/// Resolves the requested position against the room walls and stores the
/// result. Everyone else sees the resolved position; the mover gets a full
/// update only when their request was corrected.
async fn handle_move(
    ctx: &GameContext,
    conn: &ClientConnection,
    envelope: &Envelope,
) -> Result<Handled, GameError> {
    let player_id = conn.player_id();
    let desired = envelope
        .payload::<MovePayload>()
        .map_err(|source| GameError::MalformedPayload {
            kind: "player_move",
            source,
        })?
        .position();

    let (resolved, correction) = {
        let mut store = ctx.store.write().await;
        let player = store
            .player_mut(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        if !player.is_alive() {
            return Err(GameError::PlayerDead(player_id.to_string()));
        }

        let resolved = ctx.room.resolve_move(player.position(), desired);
        player.set_position(resolved);
        ctx.broadcast.send(Envelope::player_move(player_id, resolved));
        let correction = (resolved != desired).then(|| Envelope::player_update(player));
        (resolved, correction)
    };

    let corrected = correction.is_some();
    if let Some(update) = correction {
        debug!(
            "Corrected move for player {} to ({:.1}, {:.1})",
            player_id, resolved.x, resolved.y
        );
        if let Err(e) = conn.send(&update).await {
            debug!("Could not send correction to player {}: {}", player_id, e);
        }
    }
    Ok(Handled::Moved {
        resolved,
        corrected,
    })
}

async fn handle_action(
    ctx: &GameContext,
    player_id: &str,
    envelope: &Envelope,
) -> Result<Handled, GameError> {
    let action = envelope
        .payload::<ActionPayload>()
        .map_err(|source| GameError::MalformedPayload {
            kind: "player_action",
            source,
        })?;
    let target = action.target.clone().filter(|t| !t.is_empty());

    match action.kind() {
        Action::Attack => {
            let enemy_id = target.ok_or_else(|| GameError::MissingTarget(action.action.clone()))?;
            let mut store = ctx.store.write().await;
            combat::apply_basic_attack(&mut store, player_id, &enemy_id, &ctx.broadcast)
                .map(Handled::Attacked)
        }
        Action::CriticalStrike => {
            let enemy_id = target.ok_or_else(|| GameError::MissingTarget(action.action.clone()))?;
            let mut store = ctx.store.write().await;
            combat::apply_critical_strike(&mut store, player_id, &enemy_id, &ctx.broadcast)
                .map(Handled::Attacked)
        }
        Action::Other(name) => {
            debug!("Relaying action {} from player {}", name, player_id);
            ctx.broadcast.send(Envelope::player_action(player_id, envelope.data.clone()));
            Ok(Handled::Relayed(name))
        }
    }
}

async fn send_snapshot(ctx: &GameContext, conn: &ClientConnection) -> Result<Handled, GameError> {
    let snapshot = {
        let store = ctx.store.read().await;
        store.snapshot(&ctx.room)
    };
    if let Err(e) = conn.send(&Envelope::game_state(&snapshot)).await {
        debug!("Could not send game state to player {}: {}", conn.player_id(), e);
    }
    Ok(Handled::SnapshotSent)
}
