//! Player, enemy and weapon data as they live on the server and travel on
//! the wire.

use crate::geometry::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Weapon range values are in tiles; multiply by this to get pixels.
pub const WEAPON_RANGE_SCALE: i32 = 25;

pub const DEFAULT_SPAWN: Position = Position::new(400.0, 300.0);
pub const PLAYER_MAX_HEALTH: i32 = 100;
pub const WARRIOR_MAX_RAGE: i32 = 100;
pub const ENEMY_MAX_HEALTH: i32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub id: String,
    pub name: String,
    pub damage: i32,
    /// Range in tiles, see [`WEAPON_RANGE_SCALE`].
    pub range: i32,
    pub weapon_type: String,
    pub delay_ms: u64,
}

impl Weapon {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        damage: i32,
        range: i32,
        weapon_type: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            damage,
            range,
            weapon_type: weapon_type.into(),
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn pixel_range(&self) -> f64 {
        f64::from(self.range * WEAPON_RANGE_SCALE)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Character class. Only warriors have class-specific mechanics (rage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerClass {
    #[default]
    Warrior,
    Mage,
    Rogue,
}

impl PlayerClass {
    pub fn is_warrior(&self) -> bool {
        matches!(self, PlayerClass::Warrior)
    }
}

impl std::fmt::Display for PlayerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlayerClass::Warrior => "warrior",
            PlayerClass::Mage => "mage",
            PlayerClass::Rogue => "rogue",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub class: PlayerClass,
    pub health: i32,
    pub max_health: i32,
    /// Class resource: rage for warriors, mana otherwise.
    #[serde(rename = "mana")]
    pub resource: i32,
    #[serde(rename = "max_mana")]
    pub max_resource: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<Weapon>,
    #[serde(default)]
    pub dead: bool,
}

impl Player {
    /// A freshly connected player: a warrior at the spawn point with full
    /// health, no rage and a wooden sword.
    pub fn spawn(id: impl Into<String>, weapon_id: impl Into<String>) -> Self {
        let id = id.into();
        let short: String = id.chars().take(8).collect();
        Self {
            name: format!("Player {}", short),
            id,
            x: DEFAULT_SPAWN.x,
            y: DEFAULT_SPAWN.y,
            class: PlayerClass::Warrior,
            health: PLAYER_MAX_HEALTH,
            max_health: PLAYER_MAX_HEALTH,
            resource: 0,
            max_resource: WARRIOR_MAX_RAGE,
            weapon: Some(Weapon::new(
                weapon_id,
                "Wooden Sword",
                5,
                1,
                "sword",
                Duration::from_secs(1),
            )),
            dead: false,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn set_position(&mut self, pos: Position) {
        self.x = pos.x;
        self.y = pos.y;
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Subtracts `amount` from health, clamping at zero. Marks the player
    /// dead when health reaches zero. Returns the new health.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        self.health = (self.health - amount).clamp(0, self.max_health);
        if self.health == 0 {
            self.dead = true;
        }
        self.health
    }

    /// Adds to the class resource, capped at the maximum. Returns true if
    /// the value changed.
    pub fn gain_resource(&mut self, amount: i32) -> bool {
        let before = self.resource;
        self.resource = (self.resource + amount).clamp(0, self.max_resource);
        self.resource != before
    }

    /// Removes from the class resource, floored at zero. Returns true if the
    /// value changed.
    pub fn drain_resource(&mut self, amount: i32) -> bool {
        let before = self.resource;
        self.resource = (self.resource - amount).clamp(0, self.max_resource);
        self.resource != before
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub enemy_type: String,
    pub health: i32,
    pub max_health: i32,
    #[serde(default)]
    pub mana: i32,
    #[serde(default)]
    pub max_mana: i32,
    /// Player currently being chased or attacked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<Weapon>,
    /// Accumulated threat per player id. Entries only grow until removed.
    #[serde(skip)]
    pub threat: BTreeMap<String, f64>,
    #[serde(skip)]
    pub last_attack: Option<Instant>,
}

impl Enemy {
    /// A basic melee enemy with claws.
    pub fn basic(id: impl Into<String>, weapon_id: impl Into<String>, pos: Position) -> Self {
        let id = id.into();
        let short: String = id.chars().take(8).collect();
        Self {
            name: format!("Enemy {}", short),
            id,
            x: pos.x,
            y: pos.y,
            enemy_type: "basic".to_string(),
            health: ENEMY_MAX_HEALTH,
            max_health: ENEMY_MAX_HEALTH,
            mana: 0,
            max_mana: 0,
            target_id: None,
            weapon: Some(Weapon::new(
                weapon_id,
                "Claws",
                3,
                1,
                "melee",
                Duration::from_secs(2),
            )),
            threat: BTreeMap::new(),
            last_attack: None,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn set_position(&mut self, pos: Position) {
        self.x = pos.x;
        self.y = pos.y;
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Subtracts `amount` from health, clamping at zero. Returns the new
    /// health.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        self.health = (self.health - amount).clamp(0, self.max_health);
        self.health
    }

    pub fn add_threat(&mut self, player_id: &str, amount: f64) {
        *self.threat.entry(player_id.to_string()).or_insert(0.0) += amount.max(0.0);
    }

    pub fn threat_for(&self, player_id: &str) -> f64 {
        self.threat.get(player_id).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_spawn_defaults() {
        let player = Player::spawn("abcdef0123456789", "w1");
        assert_eq!(player.name, "Player abcdef01");
        assert_eq!(player.position(), DEFAULT_SPAWN);
        assert_eq!(player.class, PlayerClass::Warrior);
        assert_eq!(player.health, 100);
        assert_eq!(player.resource, 0);
        assert_eq!(player.max_resource, 100);
        assert_eq!(player.weapon.as_ref().map(|w| w.damage), Some(5));
        assert!(player.is_alive());
    }

    #[test]
    fn test_player_damage_clamps_at_zero() {
        let mut player = Player::spawn("p1", "w1");
        assert_eq!(player.take_damage(250), 0);
        assert_eq!(player.health, 0);
        assert!(player.dead);
    }

    #[test]
    fn test_resource_gain_caps_at_max() {
        let mut player = Player::spawn("p1", "w1");
        player.resource = 98;
        assert!(player.gain_resource(5));
        assert_eq!(player.resource, 100);
        assert!(!player.gain_resource(5));
        assert_eq!(player.resource, 100);
    }

    #[test]
    fn test_resource_drain_floors_at_zero() {
        let mut player = Player::spawn("p1", "w1");
        player.resource = 1;
        assert!(player.drain_resource(2));
        assert_eq!(player.resource, 0);
        assert!(!player.drain_resource(2));
    }

    #[test]
    fn test_enemy_damage_clamps_at_zero() {
        let mut enemy = Enemy::basic("e1", "w2", Position::new(200.0, 200.0));
        assert_eq!(enemy.take_damage(80), 0);
        assert!(enemy.is_dead());
    }

    #[test]
    fn test_threat_accumulates() {
        let mut enemy = Enemy::basic("e1", "w2", Position::new(200.0, 200.0));
        enemy.add_threat("p1", 5.0);
        enemy.add_threat("p1", 0.1);
        enemy.add_threat("p1", -3.0);
        assert!((enemy.threat_for("p1") - 5.1).abs() < 1e-9);
        assert_eq!(enemy.threat_for("nobody"), 0.0);
    }

    #[test]
    fn test_weapon_range_and_delay() {
        let weapon = Weapon::new("w", "Spear", 4, 2, "polearm", Duration::from_millis(1500));
        assert_eq!(weapon.pixel_range(), 50.0);
        assert_eq!(weapon.delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_enemy_snapshot_omits_server_only_fields() {
        let mut enemy = Enemy::basic("e1", "w2", Position::new(200.0, 200.0));
        enemy.add_threat("p1", 3.0);
        let json = serde_json::to_value(&enemy).unwrap();
        assert!(json.get("threat").is_none());
        assert!(json.get("last_attack").is_none());
        assert_eq!(json["health"], 50);
    }

    #[test]
    fn test_player_resource_uses_mana_field_names() {
        let player = Player::spawn("p1", "w1");
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(json["mana"], 0);
        assert_eq!(json["max_mana"], 100);
        assert_eq!(json["class"], "warrior");
    }
}
