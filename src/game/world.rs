//! Authoritative world state: players, projectiles and pending respawns

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::{PlayerView, ServerMsg};

use super::combat::Projectile;
use super::respawn::RespawnScheduler;

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub position: Vec3,
    /// Rotation in radians
    pub yaw: f32,
    pub health: i32,
    pub ammo: u32,
    pub alive: bool,
    /// Timestamp (ms) of the last accepted shot
    pub last_fire: Option<u64>,
    /// Timestamp (ms) of the last accepted input
    pub last_input: Option<u64>,
}

impl Player {
    pub fn new(id: Uuid, position: Vec3, config: &GameConfig) -> Self {
        Self {
            id,
            position,
            yaw: 0.0,
            health: config.spawn_health,
            ammo: config.max_ammo,
            alive: true,
            last_fire: None,
            last_input: None,
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            position: self.position,
            yaw: self.yaw,
            health: self.health,
            ammo: self.ammo,
            alive: self.alive,
        }
    }
}

/// Who a notification is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Session(Uuid),
}

/// Outbound message produced by a world mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub to: Recipient,
    pub msg: ServerMsg,
}

/// Notifications collected during a step, published by the simulation loop afterwards
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast(&mut self, msg: ServerMsg) {
        self.pending.push(Notification {
            to: Recipient::All,
            msg,
        });
    }

    pub fn send(&mut self, session_id: Uuid, msg: ServerMsg) {
        self.pending.push(Notification {
            to: Recipient::Session(session_id),
            msg,
        });
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Notification> {
        self.pending.drain(..)
    }
}

/// The world store (owned by the simulation task)
pub struct World {
    pub config: Arc<GameConfig>,
    pub tick: u64,
    pub(super) players: HashMap<Uuid, Player>,
    /// Session registration order, used for deterministic hit testing
    pub(super) order: Vec<Uuid>,
    pub(super) projectiles: Vec<Projectile>,
    pub(super) respawns: RespawnScheduler,
    rng: ChaCha8Rng,
}

impl World {
    pub fn new(config: Arc<GameConfig>) -> Self {
        let rng = match config.world_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            config,
            tick: 0,
            players: HashMap::new(),
            order: Vec::new(),
            projectiles: Vec::new(),
            respawns: RespawnScheduler::new(),
            rng,
        }
    }

    /// Random spawn point on the arena floor
    pub fn spawn_position(&mut self) -> Vec3 {
        let extent = self.config.spawn_extent;
        let (x, z) = if extent > 0.0 {
            (
                self.rng.gen_range(-extent..extent),
                self.rng.gen_range(-extent..extent),
            )
        } else {
            (0.0, 0.0)
        };
        Vec3::new(x, self.config.spawn_height, z)
    }

    /// Register a new session: create its player, acknowledge the id and
    /// broadcast the roster.
    pub fn connect(&mut self, session_id: Uuid, out: &mut Outbox) {
        if self.players.contains_key(&session_id) {
            return;
        }

        let position = self.spawn_position();
        self.players
            .insert(session_id, Player::new(session_id, position, &self.config));
        self.order.push(session_id);

        out.send(session_id, ServerMsg::Welcome { id: session_id });
        out.broadcast(self.roster());
    }

    /// Remove a session's player. The roster is broadcast even if the session
    /// was never registered, so every disconnect yields exactly one roster.
    pub fn disconnect(&mut self, session_id: Uuid, out: &mut Outbox) {
        if self.players.remove(&session_id).is_some() {
            self.order.retain(|id| *id != session_id);
        }
        out.broadcast(self.roster());
    }

    pub fn roster(&self) -> ServerMsg {
        ServerMsg::PlayersUpdate {
            players: self
                .players
                .iter()
                .map(|(id, p)| (*id, p.view()))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    #[cfg(test)]
    pub fn player_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players in registration order
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }
}
