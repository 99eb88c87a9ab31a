//! Projectile movement and hit detection

use glam::Vec3;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

use super::combat::CombatSystem;
use super::world::{Outbox, World};

/// Physics helpers
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance a position by `velocity * dt`
    pub fn integrate(position: Vec3, velocity: Vec3, dt: f32) -> Vec3 {
        position + velocity * dt
    }

    /// Strict sphere test on squared distance
    pub fn within_radius(a: Vec3, b: Vec3, radius: f32) -> bool {
        a.distance_squared(b) < radius * radius
    }
}

/// Hit resolved during a physics step
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: Uuid,
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub health: i32,
    pub target_killed: bool,
}

impl World {
    /// Run one fine tick: advance, expire, then hit-test every live projectile.
    pub fn step_physics(&mut self, now: u64, out: &mut Outbox) -> Vec<HitResult> {
        self.tick += 1;

        let dt = self.config.tick_delta();
        let lifetime_ms = self.config.projectile_lifetime_ms;
        let radius = self.config.hit_radius;
        let damage = self.config.damage_per_hit;

        let players = &mut self.players;
        let order = &self.order;
        let mut hits = Vec::new();

        self.projectiles.retain_mut(|projectile| {
            projectile.position =
                PhysicsSystem::integrate(projectile.position, projectile.velocity, dt);

            if projectile.age(now) > lifetime_ms {
                return false;
            }

            for target_id in order {
                if *target_id == projectile.owner_id {
                    continue;
                }
                let Some(target) = players.get_mut(target_id) else {
                    continue;
                };
                if !target.alive
                    || !PhysicsSystem::within_radius(projectile.position, target.position, radius)
                {
                    continue;
                }

                let (health, killed) = CombatSystem::apply_damage(target.health, damage);
                target.health = health;
                if killed {
                    target.alive = false;
                }

                hits.push(HitResult {
                    projectile_id: projectile.id,
                    shooter_id: projectile.owner_id,
                    target_id: *target_id,
                    health,
                    target_killed: killed,
                });
                return false;
            }

            true
        });

        for hit in &hits {
            out.send(
                hit.target_id,
                ServerMsg::Hit {
                    from: hit.shooter_id,
                    health: hit.health,
                },
            );
            out.send(
                hit.shooter_id,
                ServerMsg::HitConfirm {
                    target: hit.target_id,
                },
            );
            debug!(
                projectile_id = %hit.projectile_id,
                shooter_id = %hit.shooter_id,
                target_id = %hit.target_id,
                health = hit.health,
                "Projectile hit"
            );

            if hit.target_killed {
                info!(killer_id = %hit.shooter_id, victim_id = %hit.target_id, "Player killed");
                out.broadcast(ServerMsg::PlayerDied {
                    id: hit.target_id,
                    by: hit.shooter_id,
                });
                self.schedule_respawn(hit.target_id, now);
            }
        }

        hits
    }
}
