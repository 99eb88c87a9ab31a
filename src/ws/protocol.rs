//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Client-reported movement state
    Input {
        /// Player position `[x, y, z]`
        position: Vec3,
        /// Facing in radians
        yaw: f32,
    },

    /// Fire the weapon
    Shoot {
        /// Aim direction, need not be normalized
        direction: Vec3,
    },

    /// Refill the magazine
    Reload,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Decode and validate a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let msg: ClientMsg = serde_json::from_str(text)?;
        msg.validate()?;
        Ok(msg)
    }

    /// Reject messages carrying NaN or infinite numbers
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMsg::Input { position, yaw } => {
                if !position.is_finite() {
                    return Err(ProtocolError::NonFinite("position"));
                }
                if !yaw.is_finite() {
                    return Err(ProtocolError::NonFinite("yaw"));
                }
            }
            ClientMsg::Shoot { direction } => {
                if !direction.is_finite() {
                    return Err(ProtocolError::NonFinite("direction"));
                }
            }
            ClientMsg::Reload | ClientMsg::Ping { .. } => {}
        }
        Ok(())
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Identity acknowledgement after connection
    Welcome { id: Uuid },

    /// Full roster, sent whenever a player joins, leaves or respawns
    PlayersUpdate { players: HashMap<Uuid, PlayerView> },

    /// Reload acknowledgement (requesting session only)
    Reloaded { ammo: u32 },

    /// A player fired, for muzzle-flash effects
    ShotFired { owner: Uuid },

    /// You were hit
    Hit {
        /// Attacker session id
        from: Uuid,
        /// Your health after the hit
        health: i32,
    },

    /// Your projectile hit `target`
    HitConfirm { target: Uuid },

    /// Player `id` was killed by `by`
    PlayerDied { id: Uuid, by: Uuid },

    /// World snapshot (sent at the coarse tick rate)
    State {
        /// Server tick number
        tick: u64,
        players: Vec<PlayerView>,
        bullets: Vec<ProjectileView>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },
}

/// Public view of a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub position: Vec3,
    /// Rotation in radians
    pub yaw: f32,
    /// Health (0-100)
    pub health: i32,
    pub ammo: u32,
    pub alive: bool,
}

/// Public view of a projectile. Owner and velocity stay server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub id: Uuid,
    pub position: Vec3,
}

/// Inbound frame rejected by the gateway
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("non-finite value in field `{0}`")]
    NonFinite(&'static str),
}
