use serde::{Deserialize, Serialize};

/// A point in room space. Positive x is to the right, positive y is down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Moves `step` units from `self` toward `target` along the normalized
    /// direction vector. Returns `self` unchanged when the points coincide.
    pub fn step_toward(&self, target: &Position, step: f64) -> Position {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > 0.0 {
            Position {
                x: self.x + (dx / distance) * step,
                y: self.y + (dy / distance) * step,
            }
        } else {
            *self
        }
    }
}
