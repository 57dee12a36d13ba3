//! JSON wire protocol: one [`Envelope`] per WebSocket text frame, with a
//! per-type payload in `data`.

use crate::collision::Room;
use crate::entities::{Enemy, Player};
use crate::geometry::Position;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PlayerJoin,
    PlayerLeave,
    PlayerMove,
    PlayerUpdate,
    PlayerAction,
    GameState,
    EnemySpawn,
    EnemyUpdate,
    RoomData,
    Error,
    /// Any type string this build does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Current Unix time in milliseconds.
pub fn timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}

fn encode<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value)
        .map_err(|e| warn!("Failed to encode payload: {}", e))
        .ok()
}

impl Envelope {
    pub fn new(kind: MessageType, player_id: Option<String>, data: Option<Value>) -> Self {
        Self {
            kind,
            player_id,
            data,
            timestamp: timestamp_millis(),
        }
    }

    pub fn player_join(player: &Player) -> Self {
        Self::new(MessageType::PlayerJoin, Some(player.id.clone()), encode(player))
    }

    pub fn player_leave(player_id: &str) -> Self {
        Self::new(MessageType::PlayerLeave, Some(player_id.to_string()), None)
    }

    pub fn player_move(player_id: &str, pos: Position) -> Self {
        Self::new(
            MessageType::PlayerMove,
            Some(player_id.to_string()),
            encode(&MovePayload { x: pos.x, y: pos.y }),
        )
    }

    pub fn player_update(player: &Player) -> Self {
        Self::new(MessageType::PlayerUpdate, Some(player.id.clone()), encode(player))
    }

    /// Relays an action the server has no rules for, payload untouched.
    pub fn player_action(player_id: &str, data: Option<Value>) -> Self {
        Self::new(MessageType::PlayerAction, Some(player_id.to_string()), data)
    }

    pub fn enemy_spawn(enemy: &Enemy) -> Self {
        Self::new(MessageType::EnemySpawn, None, encode(enemy))
    }

    pub fn enemy_update(enemy: &Enemy) -> Self {
        Self::new(MessageType::EnemyUpdate, None, encode(enemy))
    }

    pub fn enemy_death(enemy_id: &str) -> Self {
        Self::new(
            MessageType::EnemyUpdate,
            None,
            encode(&DeathMarker::new(enemy_id)),
        )
    }

    pub fn room_data(room: &Room) -> Self {
        Self::new(MessageType::RoomData, None, encode(room))
    }

    pub fn game_state(snapshot: &GameSnapshot) -> Self {
        Self::new(MessageType::GameState, None, encode(snapshot))
    }

    pub fn error(player_id: &str, payload: ErrorPayload) -> Self {
        Self::new(MessageType::Error, Some(player_id.to_string()), encode(&payload))
    }

    /// Decodes `data` as `T`. A missing payload decodes like JSON `null`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.data.clone().unwrap_or(Value::Null))
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovePayload {
    pub x: f64,
    pub y: f64,
}

impl MovePayload {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Recognised player actions. Anything else is relayed as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Attack,
    CriticalStrike,
    Other(String),
}

impl ActionPayload {
    pub fn new(action: impl Into<String>, target: Option<String>) -> Self {
        Self {
            action: action.into(),
            target,
        }
    }

    pub fn kind(&self) -> Action {
        match self.action.as_str() {
            "attack" => Action::Attack,
            "critical_strike" => Action::CriticalStrike,
            other => Action::Other(other.to_string()),
        }
    }
}

/// Minimal `enemy_update` payload announcing that an enemy was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathMarker {
    pub id: String,
    #[serde(default)]
    pub dead: bool,
}

impl DeathMarker {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dead: true,
        }
    }
}

/// The two shapes an `enemy_update` payload can take.
#[derive(Debug, Clone, PartialEq)]
pub enum EnemyEvent {
    Snapshot(Box<Enemy>),
    Death(String),
}

impl EnemyEvent {
    /// Tries the narrow death-marker shape first, then a full snapshot.
    pub fn decode(data: &Value) -> Result<Self, serde_json::Error> {
        if let Ok(marker) = DeathMarker::deserialize(data) {
            if marker.dead {
                return Ok(EnemyEvent::Death(marker.id));
            }
        }
        let enemy = Enemy::deserialize(data)?;
        Ok(EnemyEvent::Snapshot(Box::new(enemy)))
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, serde_json::Error> {
        Self::decode(envelope.data.as_ref().unwrap_or(&Value::Null))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Full world picture, sent in answer to a `game_state` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub players: Vec<Player>,
    pub enemies: Vec<Enemy>,
    pub room: Room,
}
