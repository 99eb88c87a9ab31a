//! Combat system - firing, reloading, damage

use glam::Vec3;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{ProjectileView, ServerMsg};

use super::world::{Outbox, World};

/// Aim used when the client sends a zero-length direction
pub const DEFAULT_FORWARD: Vec3 = Vec3::Z;

/// Distance in front of the shooter a projectile spawns at
pub const MUZZLE_OFFSET: f32 = 1.0;

/// Active projectile in the game
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Spawn timestamp (ms)
    pub created_at: u64,
}

impl Projectile {
    pub fn new(owner_id: Uuid, origin: Vec3, direction: Vec3, speed: f32, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            position: origin + direction * MUZZLE_OFFSET,
            velocity: direction * speed,
            created_at: now,
        }
    }

    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    pub fn view(&self) -> ProjectileView {
        ProjectileView {
            id: self.id,
            position: self.position,
        }
    }
}

/// Stateless combat rules
pub struct CombatSystem;

impl CombatSystem {
    /// Check if the weapon is off cooldown
    pub fn cooldown_ready(last_fire: Option<u64>, now: u64, cooldown_ms: u64) -> bool {
        match last_fire {
            Some(last) => now.saturating_sub(last) >= cooldown_ms,
            None => true,
        }
    }

    /// Normalized aim, falling back to forward only for an all-zero vector.
    /// Normalizes in f64 so huge or tiny finite components don't overflow to
    /// infinity or underflow to zero when squared.
    pub fn aim_direction(direction: Vec3) -> Vec3 {
        if direction == Vec3::ZERO {
            return DEFAULT_FORWARD;
        }
        let aim = direction.as_dvec3().normalize_or_zero().as_vec3();
        if aim == Vec3::ZERO {
            DEFAULT_FORWARD
        } else {
            aim
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: i32, damage: i32) -> (i32, bool) {
        let new_health = current_health.saturating_sub(damage).max(0);
        (new_health, new_health == 0)
    }
}

impl World {
    /// Handle a fire action. Rate-limited or empty-clip shots are dropped silently.
    pub fn fire(&mut self, session_id: Uuid, direction: Vec3, now: u64, out: &mut Outbox) {
        let cooldown_ms = self.config.fire_cooldown_ms;
        let speed = self.config.projectile_speed;

        let Some(player) = self.players.get_mut(&session_id) else {
            return;
        };
        if !player.alive || player.ammo == 0 {
            return;
        }
        if !CombatSystem::cooldown_ready(player.last_fire, now, cooldown_ms) {
            debug!(session_id = %session_id, "Shot rejected by cooldown");
            return;
        }

        player.ammo -= 1;
        player.last_fire = Some(now);

        let aim = CombatSystem::aim_direction(direction);
        let projectile = Projectile::new(session_id, player.position, aim, speed, now);
        self.projectiles.push(projectile);

        out.broadcast(ServerMsg::ShotFired { owner: session_id });
    }

    /// Refill the magazine and acknowledge to the requester only
    pub fn reload(&mut self, session_id: Uuid, out: &mut Outbox) {
        let max_ammo = self.config.max_ammo;
        if let Some(player) = self.players.get_mut(&session_id) {
            player.ammo = max_ammo;
            out.send(session_id, ServerMsg::Reloaded { ammo: max_ammo });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::tests::{id, test_world};
    use crate::game::world::{Notification, Recipient};

    fn world_with(n: u128) -> World {
        let mut world = test_world();
        let mut out = Outbox::new();
        for i in 1..=n {
            world.connect(id(i), &mut out);
        }
        world
    }

    #[test]
    fn fire_spends_ammo_and_spawns_projectile() {
        let mut world = world_with(1);
        world.player_mut(&id(1)).unwrap().position = Vec3::new(0.0, 1.6, 0.0);
        let mut out = Outbox::new();

        world.fire(id(1), Vec3::new(0.0, 0.0, 5.0), 1_000, &mut out);

        let player = world.player(&id(1)).unwrap();
        assert_eq!(player.ammo, 11);
        assert_eq!(player.last_fire, Some(1_000));

        let projectiles = world.projectiles();
        assert_eq!(projectiles.len(), 1);
        assert_eq!(projectiles[0].owner_id, id(1));
        assert_eq!(projectiles[0].position, Vec3::new(0.0, 1.6, 1.0));
        assert_eq!(projectiles[0].velocity, Vec3::new(0.0, 0.0, 40.0));

        let sent: Vec<_> = out.drain().collect();
        assert_eq!(
            sent,
            vec![Notification {
                to: Recipient::All,
                msg: ServerMsg::ShotFired { owner: id(1) }
            }]
        );
    }

    #[test]
    fn cooldown_blocks_rapid_fire() {
        let mut world = world_with(1);
        let mut out = Outbox::new();

        world.fire(id(1), Vec3::Z, 1_000, &mut out);
        world.fire(id(1), Vec3::Z, 1_149, &mut out);
        assert_eq!(world.player(&id(1)).unwrap().ammo, 11);
        assert_eq!(world.projectiles().len(), 1);

        world.fire(id(1), Vec3::Z, 1_150, &mut out);
        assert_eq!(world.player(&id(1)).unwrap().ammo, 10);
        assert_eq!(world.projectiles().len(), 2);
    }

    #[test]
    fn first_shot_allowed_at_time_zero() {
        let mut world = world_with(1);
        let mut out = Outbox::new();
        world.fire(id(1), Vec3::Z, 0, &mut out);
        assert_eq!(world.player(&id(1)).unwrap().ammo, 11);
    }

    #[test]
    fn empty_clip_and_dead_players_cannot_fire() {
        let mut world = world_with(2);
        let mut out = Outbox::new();

        world.player_mut(&id(1)).unwrap().ammo = 0;
        world.fire(id(1), Vec3::Z, 1_000, &mut out);

        world.player_mut(&id(2)).unwrap().alive = false;
        world.fire(id(2), Vec3::Z, 1_000, &mut out);

        assert_eq!(world.player(&id(1)).unwrap().ammo, 0);
        assert_eq!(world.player(&id(2)).unwrap().ammo, 12);
        assert!(world.projectiles().is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_session_is_ignored() {
        let mut world = world_with(1);
        let mut out = Outbox::new();
        world.fire(id(99), Vec3::Z, 1_000, &mut out);
        world.reload(id(99), &mut out);
        assert!(world.projectiles().is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn zero_direction_falls_back_to_forward() {
        assert_eq!(CombatSystem::aim_direction(Vec3::ZERO), DEFAULT_FORWARD);
        assert_eq!(CombatSystem::aim_direction(Vec3::new(-0.0, 0.0, -0.0)), DEFAULT_FORWARD);
        let tiny = CombatSystem::aim_direction(Vec3::new(1e-30, 0.0, 0.0));
        assert!((tiny - Vec3::X).length() < 1e-6);
        let aim = CombatSystem::aim_direction(Vec3::new(3.0, 0.0, 4.0));
        assert!((aim.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn extreme_but_finite_aim_keeps_its_direction() {
        let mut world = world_with(1);
        let mut out = Outbox::new();

        world.fire(id(1), Vec3::new(1e20, 0.0, 0.0), 0, &mut out);
        world.fire(id(1), Vec3::new(1e-25, 0.0, 0.0), 1_000, &mut out);
        world.fire(id(1), Vec3::new(0.0, -3e38, 3e38), 2_000, &mut out);

        let velocities: Vec<_> = world.projectiles().iter().map(|p| p.velocity).collect();
        assert_eq!(velocities.len(), 3);
        assert!((velocities[0] - Vec3::new(40.0, 0.0, 0.0)).length() < 1e-4);
        assert!((velocities[1] - Vec3::new(40.0, 0.0, 0.0)).length() < 1e-4);
        let diagonal = 40.0 / 2f32.sqrt();
        assert!((velocities[2] - Vec3::new(0.0, -diagonal, diagonal)).length() < 1e-3);
    }

    #[test]
    fn ammo_never_underflows() {
        let mut world = world_with(1);
        let mut out = Outbox::new();
        for shot in 0..20u64 {
            world.fire(id(1), Vec3::Z, shot * 1_000, &mut out);
        }
        assert_eq!(world.player(&id(1)).unwrap().ammo, 0);
        assert_eq!(world.projectiles().len(), 12);
    }

    #[test]
    fn reload_refills_and_is_idempotent() {
        let mut world = world_with(2);
        let mut out = Outbox::new();
        world.player_mut(&id(1)).unwrap().ammo = 3;

        world.reload(id(1), &mut out);
        assert_eq!(world.player(&id(1)).unwrap().ammo, 12);
        world.reload(id(1), &mut out);
        assert_eq!(world.player(&id(1)).unwrap().ammo, 12);

        let sent: Vec<_> = out.drain().collect();
        assert_eq!(sent.len(), 2);
        for n in sent {
            assert_eq!(n.to, Recipient::Session(id(1)));
            assert_eq!(n.msg, ServerMsg::Reloaded { ammo: 12 });
        }
    }

    #[test]
    fn damage_clamps_at_zero() {
        assert_eq!(CombatSystem::apply_damage(100, 30), (70, false));
        assert_eq!(CombatSystem::apply_damage(10, 30), (0, true));
        assert_eq!(CombatSystem::apply_damage(30, 30), (0, true));
    }
}
