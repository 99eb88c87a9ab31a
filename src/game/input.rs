//! Client movement input

use glam::Vec3;
use uuid::Uuid;

use super::world::World;

/// Limit a reported move to `max_distance` from `from`
pub fn clamp_move(from: Vec3, to: Vec3, max_distance: f32) -> Vec3 {
    let delta = to - from;
    let distance = delta.length();
    if distance <= max_distance {
        to
    } else {
        from + delta * (max_distance / distance)
    }
}

impl World {
    /// Apply a client's reported position and yaw. The server trusts the reported
    /// position unless `max_move_speed` is configured.
    pub fn apply_input(&mut self, session_id: Uuid, position: Vec3, yaw: f32, now: u64) {
        let max_move_speed = self.config.max_move_speed;
        let min_window_ms = self.config.fine_tick.as_millis() as u64;

        let Some(player) = self.players.get_mut(&session_id) else {
            return;
        };

        player.position = match (max_move_speed, player.last_input) {
            (Some(speed), Some(last)) => {
                let window_ms = now.saturating_sub(last).max(min_window_ms);
                let max_distance = speed * window_ms as f32 / 1000.0;
                clamp_move(player.position, position, max_distance)
            }
            (Some(speed), None) => {
                clamp_move(player.position, position, speed * min_window_ms as f32 / 1000.0)
            }
            (None, _) => position,
        };
        player.yaw = yaw;
        player.last_input = Some(now);
    }
}
