//! Types and rules shared by the game server and its clients: room
//! geometry, the sliding collision resolver, entity data and the JSON wire
//! protocol.

pub mod collision;
pub mod entities;
pub mod geometry;
pub mod mirror;
pub mod protocol;

pub use collision::{collides_with_walls, resolve_move, Room, Wall, ENTITY_HALF_EXTENT};
pub use entities::{
    Enemy, Player, PlayerClass, Weapon, DEFAULT_SPAWN, ENEMY_MAX_HEALTH, PLAYER_MAX_HEALTH,
    WARRIOR_MAX_RAGE, WEAPON_RANGE_SCALE,
};
pub use geometry::Position;
pub use mirror::WorldMirror;
pub use protocol::{
    timestamp_millis, Action, ActionPayload, DeathMarker, EnemyEvent, Envelope, ErrorPayload,
    GameSnapshot, MessageType, MovePayload,
};
