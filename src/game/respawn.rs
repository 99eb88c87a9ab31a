//! Delayed respawn of defeated players

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::debug;
use uuid::Uuid;

use super::world::{Outbox, World};

/// A pending respawn. Carries only the session id; liveness is checked when it runs.
/// Orders by due time first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingRespawn {
    /// Timestamp (ms) at which the respawn becomes due
    pub due_at: u64,
    pub session_id: Uuid,
}

/// Pending respawns, earliest due first
#[derive(Debug, Default)]
pub struct RespawnScheduler {
    queue: BinaryHeap<Reverse<PendingRespawn>>,
}

impl RespawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, session_id: Uuid, due_at: u64) {
        self.queue.push(Reverse(PendingRespawn { due_at, session_id }));
    }

    /// Pop the earliest entry due at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Option<PendingRespawn> {
        match self.queue.peek() {
            Some(Reverse(entry)) if entry.due_at <= now => self.queue.pop().map(|Reverse(e)| e),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl World {
    /// Queue a respawn for a player that just died
    pub fn schedule_respawn(&mut self, session_id: Uuid, now: u64) {
        let due_at = now + self.config.respawn_delay_ms;
        self.respawns.schedule(session_id, due_at);
    }

    #[cfg(test)]
    pub fn pending_respawns(&self) -> usize {
        self.respawns.len()
    }

    /// Revive every player whose respawn is due. Entries for sessions that
    /// disconnected in the meantime are dropped without touching the world.
    pub fn run_due_respawns(&mut self, now: u64, out: &mut Outbox) {
        while let Some(entry) = self.respawns.pop_due(now) {
            if !self.players.contains_key(&entry.session_id) {
                debug!(session_id = %entry.session_id, "Respawn skipped, session gone");
                continue;
            }

            let position = self.spawn_position();
            let spawn_health = self.config.spawn_health;
            if let Some(player) = self.players.get_mut(&entry.session_id) {
                player.alive = true;
                player.health = spawn_health;
                player.position = position;
            }
            debug!(session_id = %entry.session_id, "Player respawned");
            out.broadcast(self.roster());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::tests::{id, test_world};
    use crate::ws::protocol::ServerMsg;
    use glam::Vec3;

    #[test]
    fn pop_due_respects_deadline() {
        let mut scheduler = RespawnScheduler::new();
        scheduler.schedule(id(1), 2_000);
        scheduler.schedule(id(2), 2_500);

        assert_eq!(scheduler.pop_due(1_999), None);
        assert_eq!(scheduler.pop_due(2_000).map(|e| e.session_id), Some(id(1)));
        assert_eq!(scheduler.pop_due(2_000), None);
        assert_eq!(scheduler.pop_due(3_000).map(|e| e.session_id), Some(id(2)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn earlier_due_entry_is_not_blocked_by_later_one() {
        let mut scheduler = RespawnScheduler::new();
        scheduler.schedule(id(1), 5_000);
        scheduler.schedule(id(2), 3_000);

        assert_eq!(scheduler.pop_due(3_000).map(|e| e.session_id), Some(id(2)));
        assert_eq!(scheduler.pop_due(3_000), None);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pop_due(5_000).map(|e| e.session_id), Some(id(1)));
    }

    #[test]
    fn respawn_restores_player_after_delay() {
        let mut world = test_world();
        let mut out = Outbox::new();
        world.connect(id(1), &mut out);
        out.drain();

        let dead_at = Vec3::new(100.0, 1.6, 100.0);
        {
            let player = world.player_mut(&id(1)).unwrap();
            player.alive = false;
            player.health = 0;
            player.position = dead_at;
        }
        world.schedule_respawn(id(1), 5_000);

        world.run_due_respawns(6_999, &mut out);
        assert!(!world.player(&id(1)).unwrap().alive);
        assert!(out.is_empty());

        world.run_due_respawns(7_000, &mut out);
        let player = world.player(&id(1)).unwrap();
        assert!(player.alive);
        assert_eq!(player.health, 100);
        assert_ne!(player.position, dead_at);

        let sent: Vec<_> = out.drain().collect();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].msg, ServerMsg::PlayersUpdate { .. }));
        assert_eq!(world.pending_respawns(), 0);
    }

    #[test]
    fn respawn_after_disconnect_is_a_no_op() {
        let mut world = test_world();
        let mut out = Outbox::new();
        world.connect(id(1), &mut out);
        world.connect(id(2), &mut out);
        world.player_mut(&id(1)).unwrap().alive = false;
        world.schedule_respawn(id(1), 0);
        world.disconnect(id(1), &mut out);
        out.drain();

        world.run_due_respawns(10_000, &mut out);
        assert!(world.player(&id(1)).is_none());
        assert_eq!(world.player_count(), 1);
        assert!(out.is_empty());
        assert_eq!(world.pending_respawns(), 0);
    }
}
