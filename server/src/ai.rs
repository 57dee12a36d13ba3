//! Enemy behaviour, stepped at a fixed rate.
//!
//! Each tick every enemy forgets players that are gone or dead, gains
//! proximity threat on players within its aggro radius, re-evaluates its
//! target, then either closes distance or swings when its weapon is ready.

use crate::broadcast::Broadcaster;
use crate::combat::update_target;
use crate::server::GameContext;
use crate::store::EntityStore;
use log::{debug, info};
use shared::{Enemy, Envelope, Player, Position, Room};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

/// Players closer than this accrue threat just by standing there.
pub const AGGRO_RADIUS: f64 = 100.0;
/// Threat added per tick per player inside the aggro radius.
pub const PROXIMITY_THREAT: f64 = 0.1;
/// Distance an enemy covers per tick while chasing.
pub const ENEMY_STEP: f64 = 2.0;
/// Reach of an enemy with no weapon.
pub const UNARMED_RANGE: f64 = 30.0;
pub const UNARMED_DELAY: Duration = Duration::from_secs(2);
pub const UNARMED_DAMAGE: i32 = 2;
/// Rage a warrior gains when struck.
pub const DEFENDER_RAGE_GAIN: i32 = 3;

pub const INITIAL_ENEMY_COUNT: usize = 3;

fn initial_enemy_position(index: usize) -> Position {
    let i = index as f64;
    Position::new(200.0 + i * 300.0, 200.0 + i * 150.0)
}

/// Creates the starting cohort and announces each enemy. Does nothing if
/// enemies already exist. Returns the ids spawned.
pub fn spawn_initial_enemies(store: &mut EntityStore, broadcast: &Broadcaster) -> Vec<String> {
    if store.enemy_count() > 0 {
        debug!("Enemies already present, skipping initial spawn");
        return Vec::new();
    }

    let mut spawned = Vec::with_capacity(INITIAL_ENEMY_COUNT);
    for index in 0..INITIAL_ENEMY_COUNT {
        let id = Uuid::new_v4().to_string();
        let enemy = Enemy::basic(
            id.clone(),
            Uuid::new_v4().to_string(),
            initial_enemy_position(index),
        );
        broadcast.send(Envelope::enemy_spawn(&enemy));
        info!("Spawned enemy {} at ({:.0}, {:.0})", id, enemy.x, enemy.y);
        store.insert_enemy(enemy);
        spawned.push(id);
    }
    spawned
}

fn attack_range(enemy: &Enemy) -> f64 {
    enemy
        .weapon
        .as_ref()
        .map_or(UNARMED_RANGE, |weapon| weapon.pixel_range())
}

fn attack_delay(enemy: &Enemy) -> Duration {
    enemy.weapon.as_ref().map_or(UNARMED_DELAY, |weapon| weapon.delay())
}

fn attack_damage(enemy: &Enemy) -> i32 {
    enemy
        .weapon
        .as_ref()
        .map_or(UNARMED_DAMAGE, |weapon| weapon.damage)
}

fn weapon_ready(enemy: &Enemy, now: Instant) -> bool {
    enemy
        .last_attack
        .map_or(true, |last| now.saturating_duration_since(last) > attack_delay(enemy))
}

/// Drops threat entries for players that left or died.
fn prune_threat(enemy: &mut Enemy, players: &BTreeMap<String, Player>) {
    enemy
        .threat
        .retain(|player_id, _| players.get(player_id).map_or(false, Player::is_alive));
}

fn add_proximity_threat(enemy: &mut Enemy, players: &BTreeMap<String, Player>) {
    let here = enemy.position();
    for player in players.values().filter(|p| p.is_alive()) {
        if here.distance_to(&player.position()) <= AGGRO_RADIUS {
            enemy.add_threat(&player.id, PROXIMITY_THREAT);
        }
    }
}

/// Moves one step toward `target`, sliding along walls.
fn chase(enemy: &mut Enemy, target: Position, room: &Room, broadcast: &Broadcaster) {
    let from = enemy.position();
    let desired = from.step_toward(&target, ENEMY_STEP);
    let resolved = room.resolve_move(from, desired);
    if resolved != from {
        enemy.set_position(resolved);
        broadcast.send(Envelope::enemy_update(enemy));
    }
}

fn strike(
    enemy: &mut Enemy,
    players: &mut BTreeMap<String, Player>,
    target_id: &str,
    now: Instant,
    broadcast: &Broadcaster,
) {
    let Some(target) = players.get_mut(target_id) else {
        return;
    };

    let damage = attack_damage(enemy);
    let health = target.take_damage(damage);
    enemy.last_attack = Some(now);
    if target.class.is_warrior() {
        target.gain_resource(DEFENDER_RAGE_GAIN);
    }
    debug!(
        "Enemy {} hit player {} for {} damage ({} health left)",
        enemy.id, target_id, damage, health
    );
    broadcast.send(Envelope::player_update(target));

    if !target.is_alive() {
        info!("Player {} was killed by enemy {}", target_id, enemy.id);
        enemy.threat.remove(target_id);
        enemy.target_id = None;
        update_target(enemy, players);
    }
}

fn step_enemy(
    enemy: &mut Enemy,
    players: &mut BTreeMap<String, Player>,
    room: &Room,
    now: Instant,
    broadcast: &Broadcaster,
) {
    prune_threat(enemy, players);
    add_proximity_threat(enemy, players);
    let Some(target_id) = update_target(enemy, players) else {
        return;
    };
    let Some(target_pos) = players.get(&target_id).map(Player::position) else {
        return;
    };

    if enemy.position().distance_to(&target_pos) > attack_range(enemy) {
        chase(enemy, target_pos, room, broadcast);
    } else if weapon_ready(enemy, now) {
        strike(enemy, players, &target_id, now, broadcast);
    }
}

/// One AI step over every enemy, in id order.
pub fn tick(store: &mut EntityStore, room: &Room, now: Instant, broadcast: &Broadcaster) {
    let (players, enemies) = store.split_mut();
    for enemy in enemies.values_mut() {
        step_enemy(enemy, players, room, now, broadcast);
    }
}

/// Spawns the starting enemies in the background once the first player is in.
pub async fn spawn_initial_enemies_task(ctx: GameContext) {
    let mut store = ctx.store.write().await;
    let spawned = spawn_initial_enemies(&mut store, &ctx.broadcast);
    if !spawned.is_empty() {
        info!("Initial enemy cohort of {} spawned", spawned.len());
    }
}

/// Runs [`tick`] every `period` until shutdown.
pub async fn run(ctx: GameContext, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut store = ctx.store.write().await;
                tick(&mut store, &ctx.room, Instant::now(), &ctx.broadcast);
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Enemy AI loop stopped");
}
