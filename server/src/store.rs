use crate::client::ClientConnection;
use crate::combat;
use log::debug;
use shared::{Enemy, GameSnapshot, Player, Room};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The store shared by every task. One lock guards all players, enemies and
/// the connection registry; a reader always sees a state some writer
/// produced in full.
pub type SharedStore = Arc<RwLock<EntityStore>>;

/// Authoritative world state.
///
/// Maps are ordered by id so that iteration, and with it tie-breaking in
/// target selection, is deterministic.
#[derive(Debug, Default)]
pub struct EntityStore {
    players: BTreeMap<String, Player>,
    enemies: BTreeMap<String, Enemy>,
    connections: BTreeMap<String, Arc<ClientConnection>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Adds a player. Returns true if they are now the only player.
    pub fn insert_player(&mut self, player: Player) -> bool {
        self.players.insert(player.id.clone(), player);
        self.players.len() == 1
    }

    pub fn attach_connection(&mut self, conn: Arc<ClientConnection>) {
        self.connections.insert(conn.player_id().to_string(), conn);
    }

    /// Removes a player along with their connection handle and every trace of
    /// them in enemy threat tables. Enemies that were chasing them pick a new
    /// target immediately.
    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        self.connections.remove(player_id);
        let removed = self.players.remove(player_id)?;

        for enemy in self.enemies.values_mut() {
            if enemy.threat.remove(player_id).is_some()
                || enemy.target_id.as_deref() == Some(player_id)
            {
                combat::update_target(enemy, &self.players);
            }
        }
        debug!("Removed player {}, {} remaining", player_id, self.players.len());
        Some(removed)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.get_mut(player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn insert_enemy(&mut self, enemy: Enemy) {
        self.enemies.insert(enemy.id.clone(), enemy);
    }

    pub fn remove_enemy(&mut self, enemy_id: &str) -> Option<Enemy> {
        self.enemies.remove(enemy_id)
    }

    pub fn enemy(&self, enemy_id: &str) -> Option<&Enemy> {
        self.enemies.get(enemy_id)
    }

    pub fn enemy_mut(&mut self, enemy_id: &str) -> Option<&mut Enemy> {
        self.enemies.get_mut(enemy_id)
    }

    pub fn enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.values()
    }

    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }

    /// Mutable access to both entity maps at once, for rules that touch a
    /// player and an enemy in the same step.
    pub fn split_mut(
        &mut self,
    ) -> (
        &mut BTreeMap<String, Player>,
        &mut BTreeMap<String, Enemy>,
    ) {
        (&mut self.players, &mut self.enemies)
    }

    /// Clones every registered connection handle so the caller can write to
    /// them after releasing the lock.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.values().cloned().collect()
    }

    pub fn connection(&self, player_id: &str) -> Option<Arc<ClientConnection>> {
        self.connections.get(player_id).cloned()
    }

    pub fn snapshot(&self, room: &Room) -> GameSnapshot {
        GameSnapshot {
            players: self.players.values().cloned().collect(),
            enemies: self.enemies.values().cloned().collect(),
            room: room.clone(),
        }
    }
}
