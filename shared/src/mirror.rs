//! Client-side replica of the world, fed by server envelopes in arrival
//! order.

use crate::collision::Room;
use crate::entities::{Enemy, Player};
use crate::geometry::Position;
use crate::protocol::{EnemyEvent, Envelope, ErrorPayload, GameSnapshot, MessageType, MovePayload};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct WorldMirror {
    /// Set by the first `player_join` received, which is always our own.
    pub local_player_id: Option<String>,
    pub players: BTreeMap<String, Player>,
    pub enemies: BTreeMap<String, Enemy>,
    pub room: Room,
    pub errors: Vec<ErrorPayload>,
}

impl WorldMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.local_player_id
            .as_ref()
            .and_then(|id| self.players.get(id))
    }

    pub fn apply(&mut self, envelope: &Envelope) -> Result<(), serde_json::Error> {
        match envelope.kind {
            MessageType::PlayerJoin => {
                let player: Player = envelope.payload()?;
                if self.local_player_id.is_none() {
                    self.local_player_id = Some(player.id.clone());
                }
                self.players.insert(player.id.clone(), player);
            }
            MessageType::PlayerLeave => {
                if let Some(id) = &envelope.player_id {
                    self.players.remove(id);
                }
            }
            MessageType::PlayerMove => {
                let mv: MovePayload = envelope.payload()?;
                if let Some(player) = envelope
                    .player_id
                    .as_ref()
                    .and_then(|id| self.players.get_mut(id))
                {
                    player.set_position(mv.position());
                }
            }
            MessageType::PlayerUpdate => {
                let player: Player = envelope.payload()?;
                self.players.insert(player.id.clone(), player);
            }
            MessageType::EnemySpawn => {
                let enemy: Enemy = envelope.payload()?;
                self.enemies.insert(enemy.id.clone(), enemy);
            }
            MessageType::EnemyUpdate => match EnemyEvent::from_envelope(envelope)? {
                EnemyEvent::Death(id) => {
                    self.enemies.remove(&id);
                }
                EnemyEvent::Snapshot(enemy) => {
                    self.enemies.insert(enemy.id.clone(), *enemy);
                }
            },
            MessageType::RoomData => {
                self.room = envelope.payload()?;
            }
            MessageType::GameState => {
                let snapshot: GameSnapshot = envelope.payload()?;
                self.players = snapshot
                    .players
                    .into_iter()
                    .map(|p| (p.id.clone(), p))
                    .collect();
                self.enemies = snapshot
                    .enemies
                    .into_iter()
                    .map(|e| (e.id.clone(), e))
                    .collect();
                self.room = snapshot.room;
            }
            MessageType::Error => {
                self.errors.push(envelope.payload()?);
            }
            MessageType::PlayerAction | MessageType::Unknown => {
                debug!("Ignoring {:?} envelope", envelope.kind);
            }
        }
        Ok(())
    }

    /// Client-side prediction: moves the local player toward `desired` with
    /// the same resolver the server uses. Returns the new position if the
    /// player actually moved.
    pub fn predict_move(&mut self, desired: Position) -> Option<Position> {
        let id = self.local_player_id.clone()?;
        let room = &self.room;
        let player = self.players.get_mut(&id)?;
        let old = player.position();
        let resolved = room.resolve_move(old, desired);
        if resolved == old {
            return None;
        }
        player.set_position(resolved);
        Some(resolved)
    }

    /// Closest live enemy to the local player.
    pub fn nearest_enemy(&self) -> Option<&Enemy> {
        let me = self.local_player()?.position();
        self.enemies
            .values()
            .filter(|e| !e.is_dead())
            .min_by(|a, b| {
                me.distance_to(&a.position())
                    .total_cmp(&me.distance_to(&b.position()))
            })
    }
}
