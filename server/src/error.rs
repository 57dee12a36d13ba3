use shared::ErrorPayload;
use thiserror::Error;

/// Rule violations and bad input from a single client. None of these are
/// fatal: the offending message is dropped and the client told why.
#[derive(Error, Debug)]
pub enum GameError {
    #[error("enemy {0} not found")]
    EnemyNotFound(String),

    #[error("player {0} not found")]
    PlayerNotFound(String),

    #[error("player {0} is dead")]
    PlayerDead(String),

    #[error("{ability} requires class {required}, player is {actual}")]
    WrongClass {
        ability: &'static str,
        required: &'static str,
        actual: String,
    },

    #[error("{ability} costs {cost} rage, player has {available}")]
    InsufficientRage {
        ability: &'static str,
        cost: i32,
        available: i32,
    },

    #[error("action {0} needs a target")]
    MissingTarget(String),

    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("message type {0} is not accepted from clients")]
    UnsupportedMessage(String),
}

impl GameError {
    /// Stable machine-readable code sent in `error` envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::EnemyNotFound(_) => "enemy_not_found",
            GameError::PlayerNotFound(_) => "player_not_found",
            GameError::PlayerDead(_) => "player_dead",
            GameError::WrongClass { .. } => "wrong_class",
            GameError::InsufficientRage { .. } => "insufficient_rage",
            GameError::MissingTarget(_) => "missing_target",
            GameError::MalformedPayload { .. } => "malformed_payload",
            GameError::UnsupportedMessage(_) => "unsupported_message",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}
