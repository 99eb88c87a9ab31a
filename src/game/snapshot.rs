//! Snapshot building

use crate::ws::protocol::ServerMsg;

use super::world::World;

/// Builds world snapshots for network transmission
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot message from a single read of the world
    pub fn build(&mut self, world: &World) -> ServerMsg {
        let players: Vec<_> = world.players().map(|p| p.view()).collect();
        let bullets: Vec<_> = world.projectiles().iter().map(|p| p.view()).collect();

        self.stats.record(players.len(), bullets.len());

        ServerMsg::State {
            tick: world.tick,
            players,
            bullets,
        }
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

/// Running snapshot counters for debugging
#[derive(Debug, Default, Clone)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub avg_players_per_snapshot: f32,
    pub max_projectiles: usize,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, projectile_count: usize) {
        self.total_snapshots += 1;
        self.max_projectiles = self.max_projectiles.max(projectile_count);

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}
