//! Static room geometry and the sliding movement resolver.
//!
//! Both the server (authoritative movement, enemy chasing) and clients
//! (predictive movement) run [`resolve_move`], so it must stay a pure
//! function of its inputs.

use crate::geometry::Position;
use serde::{Deserialize, Serialize};

/// Half the side length of the square every player and enemy occupies.
pub const ENTITY_HALF_EXTENT: f64 = 10.0;

pub const ROOM_WIDTH: f64 = 1200.0;
pub const ROOM_HEIGHT: f64 = 900.0;
pub const WALL_THICKNESS: f64 = 20.0;

/// Axis-aligned wall rectangle, anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Wall {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Strict overlap between this wall and an entity box centred on `pos`.
    /// Touching edges do not count as a collision.
    pub fn overlaps_entity_at(&self, pos: &Position) -> bool {
        pos.x - ENTITY_HALF_EXTENT < self.x + self.width
            && pos.x + ENTITY_HALF_EXTENT > self.x
            && pos.y - ENTITY_HALF_EXTENT < self.y + self.height
            && pos.y + ENTITY_HALF_EXTENT > self.y
    }
}

/// The static level layout. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Room {
    pub walls: Vec<Wall>,
}

impl Room {
    pub fn new(walls: Vec<Wall>) -> Self {
        Self { walls }
    }

    /// The single rectangular dungeon room: four walls around a
    /// 1200x900 floor.
    pub fn dungeon() -> Self {
        Self::new(vec![
            Wall::new(0.0, 0.0, ROOM_WIDTH, WALL_THICKNESS),
            Wall::new(0.0, ROOM_HEIGHT - WALL_THICKNESS, ROOM_WIDTH, WALL_THICKNESS),
            Wall::new(0.0, 0.0, WALL_THICKNESS, ROOM_HEIGHT),
            Wall::new(ROOM_WIDTH - WALL_THICKNESS, 0.0, WALL_THICKNESS, ROOM_HEIGHT),
        ])
    }

    pub fn resolve_move(&self, old: Position, desired: Position) -> Position {
        resolve_move(old, desired, &self.walls)
    }
}

/// Returns true if an entity centred on `pos` would overlap any wall.
pub fn collides_with_walls(pos: &Position, walls: &[Wall]) -> bool {
    walls.iter().any(|wall| wall.overlaps_entity_at(pos))
}

/// Computes where an entity ends up when it tries to go from `old` to
/// `desired`.
///
/// The full move is taken if it is free. Otherwise the move is decomposed
/// per axis so the entity slides along the wall: horizontal first, then
/// vertical. If neither axis is free the entity stays at `old`.
pub fn resolve_move(old: Position, desired: Position, walls: &[Wall]) -> Position {
    if !collides_with_walls(&desired, walls) {
        return desired;
    }

    let horizontal = Position::new(desired.x, old.y);
    if !collides_with_walls(&horizontal, walls) {
        return horizontal;
    }

    let vertical = Position::new(old.x, desired.y);
    if !collides_with_walls(&vertical, walls) {
        return vertical;
    }

    old
}
