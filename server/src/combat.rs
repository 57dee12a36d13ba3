//! Player-initiated combat and threat-based targeting.
//!
//! Every function here runs with the entity store write lock held and only
//! enqueues broadcasts, so the order clients observe matches the order of
//! mutations.

use crate::broadcast::Broadcaster;
use crate::error::GameError;
use crate::store::EntityStore;
use log::{debug, info};
use shared::{Enemy, Envelope, Player};
use std::collections::BTreeMap;

pub const BASIC_ATTACK_RAGE_GAIN: i32 = 5;
pub const CRITICAL_STRIKE_RAGE_COST: i32 = 30;
pub const CRITICAL_STRIKE_MULTIPLIER: i32 = 2;
pub const CRITICAL_STRIKE_BONUS: i32 = 3;
/// Damage dealt by a player with no weapon.
pub const UNARMED_DAMAGE: i32 = 1;

/// Result of a successful player attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub enemy_id: String,
    pub damage: i32,
    pub remaining_health: i32,
    pub killed: bool,
}

/// Points `enemy` at the eligible player with the highest threat.
///
/// Eligible means present in `players`, alive and holding strictly positive
/// threat. Ties go to the lowest player id. With no eligible player the
/// target is cleared. Returns the new target.
pub fn update_target(enemy: &mut Enemy, players: &BTreeMap<String, Player>) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for (player_id, &threat) in &enemy.threat {
        if threat <= 0.0 || !players.get(player_id).map_or(false, Player::is_alive) {
            continue;
        }
        // Strict comparison keeps the first (lowest) id on ties.
        if best.map_or(true, |(_, top)| threat > top) {
            best = Some((player_id, threat));
        }
    }

    let chosen = best.map(|(id, threat)| (id.clone(), threat));
    let new_target = chosen.as_ref().map(|(id, _)| id.clone());
    if new_target != enemy.target_id {
        match (&enemy.target_id, &chosen) {
            (None, Some((id, threat))) => {
                info!("Enemy {} now targeting {} (threat: {:.1})", enemy.id, id, threat)
            }
            (Some(old), Some((id, threat))) => info!(
                "Enemy {} switched target from {} to {} (threat: {:.1})",
                enemy.id, old, id, threat
            ),
            (Some(old), None) => debug!("Enemy {} dropped target {}", enemy.id, old),
            (None, None) => {}
        }
        enemy.target_id = new_target.clone();
    }
    new_target
}

fn living_attacker<'a>(
    players: &'a mut BTreeMap<String, Player>,
    attacker_id: &str,
) -> Result<&'a mut Player, GameError> {
    let attacker = players
        .get_mut(attacker_id)
        .ok_or_else(|| GameError::PlayerNotFound(attacker_id.to_string()))?;
    if !attacker.is_alive() {
        return Err(GameError::PlayerDead(attacker_id.to_string()));
    }
    Ok(attacker)
}

/// Applies a hit the attacker has already paid for: damage, threat, target
/// reselection, then either an update or a death broadcast.
fn land_hit(
    store: &mut EntityStore,
    attacker_id: &str,
    enemy_id: &str,
    damage: i32,
    broadcast: &Broadcaster,
) -> Result<AttackOutcome, GameError> {
    let (players, enemies) = store.split_mut();
    let enemy = enemies
        .get_mut(enemy_id)
        .ok_or_else(|| GameError::EnemyNotFound(enemy_id.to_string()))?;

    let remaining_health = enemy.take_damage(damage);
    enemy.add_threat(attacker_id, f64::from(damage));
    update_target(enemy, players);
    info!(
        "Player {} hit enemy {} for {} damage ({} health left)",
        attacker_id, enemy_id, damage, remaining_health
    );

    let killed = enemy.is_dead();
    if killed {
        enemies.remove(enemy_id);
        info!("Enemy {} killed by player {}", enemy_id, attacker_id);
        broadcast.send(Envelope::enemy_death(enemy_id));
    } else {
        broadcast.send(Envelope::enemy_update(enemy));
    }

    Ok(AttackOutcome {
        enemy_id: enemy_id.to_string(),
        damage,
        remaining_health,
        killed,
    })
}

/// Weapon-damage attack. Warriors build rage from it.
pub fn apply_basic_attack(
    store: &mut EntityStore,
    attacker_id: &str,
    enemy_id: &str,
    broadcast: &Broadcaster,
) -> Result<AttackOutcome, GameError> {
    if store.enemy(enemy_id).is_none() {
        return Err(GameError::EnemyNotFound(enemy_id.to_string()));
    }

    let (players, _) = store.split_mut();
    let attacker = living_attacker(players, attacker_id)?;
    let damage = attacker
        .weapon
        .as_ref()
        .map_or(UNARMED_DAMAGE, |weapon| weapon.damage);
    if attacker.class.is_warrior() && attacker.gain_resource(BASIC_ATTACK_RAGE_GAIN) {
        broadcast.send(Envelope::player_update(attacker));
    }

    land_hit(store, attacker_id, enemy_id, damage, broadcast)
}

/// Warrior ability: spends rage for double weapon damage plus a flat bonus.
/// Nothing changes and nothing is broadcast unless every precondition holds.
pub fn apply_critical_strike(
    store: &mut EntityStore,
    attacker_id: &str,
    enemy_id: &str,
    broadcast: &Broadcaster,
) -> Result<AttackOutcome, GameError> {
    let enemy_exists = store.enemy(enemy_id).is_some();

    let (players, _) = store.split_mut();
    let attacker = living_attacker(players, attacker_id)?;
    if !attacker.class.is_warrior() {
        return Err(GameError::WrongClass {
            ability: "critical_strike",
            required: "warrior",
            actual: attacker.class.to_string(),
        });
    }
    if attacker.resource < CRITICAL_STRIKE_RAGE_COST {
        return Err(GameError::InsufficientRage {
            ability: "critical_strike",
            cost: CRITICAL_STRIKE_RAGE_COST,
            available: attacker.resource,
        });
    }
    if !enemy_exists {
        return Err(GameError::EnemyNotFound(enemy_id.to_string()));
    }

    let base = attacker
        .weapon
        .as_ref()
        .map_or(UNARMED_DAMAGE, |weapon| weapon.damage);
    let damage = base * CRITICAL_STRIKE_MULTIPLIER + CRITICAL_STRIKE_BONUS;
    attacker.drain_resource(CRITICAL_STRIKE_RAGE_COST);
    info!(
        "Player {} spent {} rage on a critical strike ({} left)",
        attacker_id, CRITICAL_STRIKE_RAGE_COST, attacker.resource
    );
    broadcast.send(Envelope::player_update(attacker));

    land_hit(store, attacker_id, enemy_id, damage, broadcast)
}
