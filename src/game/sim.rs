//! Authoritative simulation loop
//!
//! The loop task is the only owner of the [`World`]. Sessions talk to it through
//! [`SimHandle`]: commands go in over an mpsc queue that is drained at the start of
//! every fine tick, broadcasts come out over a broadcast channel, and directed
//! messages go to each session's own outbound queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::util::time::{server_millis, unix_millis};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::snapshot::SnapshotBuilder;
use super::world::{Outbox, Recipient, World};

/// Inbound command queue size
pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
/// Broadcast buffer; slow sessions skip messages beyond this
pub const BROADCAST_CHANNEL_CAPACITY: usize = 256;
/// Per-session directed message buffer
pub const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Commands sent from sessions to the simulation
#[derive(Debug)]
pub enum SessionCommand {
    Connect {
        session_id: Uuid,
        outbox: mpsc::Sender<ServerMsg>,
    },
    Message {
        session_id: Uuid,
        msg: ClientMsg,
        received_at: u64,
    },
    Disconnect {
        session_id: Uuid,
    },
}

/// Handle to the running simulation
#[derive(Clone)]
pub struct SimHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl SimHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }
}

/// The simulation task
pub struct Simulation {
    world: World,
    config: Arc<GameConfig>,
    command_rx: mpsc::Receiver<SessionCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    sessions: HashMap<Uuid, mpsc::Sender<ServerMsg>>,
    outbox: Outbox,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    closed: bool,
}

impl Simulation {
    pub fn new(config: Arc<GameConfig>) -> (Self, SimHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = SimHandle {
            command_tx,
            broadcast_tx: broadcast_tx.clone(),
            player_count: player_count.clone(),
        };

        let sim = Self {
            world: World::new(config.clone()),
            config,
            command_rx,
            broadcast_tx,
            sessions: HashMap::new(),
            outbox: Outbox::new(),
            snapshot_builder: SnapshotBuilder::new(),
            player_count,
            closed: false,
        };

        (sim, handle)
    }

    /// Run the fine (physics) and coarse (snapshot) ticks until every handle is dropped
    pub async fn run(mut self) {
        info!(
            fine_tick_ms = self.config.fine_tick.as_millis() as u64,
            snapshot_tick_ms = self.config.snapshot_tick.as_millis() as u64,
            "Simulation started"
        );

        let mut fine_interval = interval(self.config.fine_tick);
        fine_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut snapshot_interval = interval(self.config.snapshot_tick);
        snapshot_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // Biased so a physics tick due at the same instant lands before the snapshot
            tokio::select! {
                biased;
                _ = fine_interval.tick() => {
                    self.step(server_millis());
                }
                _ = snapshot_interval.tick() => {
                    self.broadcast_snapshot();
                }
            }

            if self.closed {
                break;
            }
        }

        let stats = self.snapshot_builder.stats();
        info!(
            snapshots = stats.total_snapshots,
            avg_players = stats.avg_players_per_snapshot,
            max_projectiles = stats.max_projectiles,
            "Simulation stopped"
        );
    }

    /// One fine tick: drain commands, run due respawns, advance physics, publish
    pub fn step(&mut self, now: u64) {
        self.process_commands();
        self.world.run_due_respawns(now, &mut self.outbox);
        self.world.step_physics(now, &mut self.outbox);
        self.publish();
    }

    /// Build and broadcast a snapshot of the current world
    pub fn broadcast_snapshot(&mut self) {
        let snapshot = self.snapshot_builder.build(&self.world);
        // No receivers just means nobody is connected
        let _ = self.broadcast_tx.send(snapshot);
    }

    /// Drain every queued command
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { session_id, outbox } => {
                self.sessions.insert(session_id, outbox);
                self.world.connect(session_id, &mut self.outbox);
                self.update_player_count();
                info!(
                    session_id = %session_id,
                    player_count = self.world.player_count(),
                    "Player joined"
                );
            }
            SessionCommand::Message {
                session_id,
                msg,
                received_at,
            } => self.handle_message(session_id, msg, received_at),
            SessionCommand::Disconnect { session_id } => {
                self.sessions.remove(&session_id);
                self.world.disconnect(session_id, &mut self.outbox);
                self.update_player_count();
                info!(
                    session_id = %session_id,
                    player_count = self.world.player_count(),
                    "Player left"
                );
            }
        }
    }

    fn handle_message(&mut self, session_id: Uuid, msg: ClientMsg, received_at: u64) {
        match msg {
            ClientMsg::Input { position, yaw } => {
                self.world.apply_input(session_id, position, yaw, received_at);
            }
            ClientMsg::Shoot { direction } => {
                self.world
                    .fire(session_id, direction, received_at, &mut self.outbox);
            }
            ClientMsg::Reload => {
                self.world.reload(session_id, &mut self.outbox);
            }
            ClientMsg::Ping { t } => {
                self.outbox.send(
                    session_id,
                    ServerMsg::Pong {
                        t,
                        server_time: unix_millis(),
                    },
                );
            }
        }
    }

    /// Route queued notifications without awaiting any session
    fn publish(&mut self) {
        for notification in self.outbox.drain() {
            match notification.to {
                Recipient::All => {
                    let _ = self.broadcast_tx.send(notification.msg);
                }
                Recipient::Session(session_id) => {
                    let Some(tx) = self.sessions.get(&session_id) else {
                        continue;
                    };
                    match tx.try_send(notification.msg) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!(session_id = %session_id, "Session queue full, dropping message");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!(session_id = %session_id, "Session queue closed");
                        }
                    }
                }
            }
        }
    }

    fn update_player_count(&self) {
        self.player_count
            .store(self.world.player_count(), Ordering::Relaxed);
    }
}
