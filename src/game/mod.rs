//! Game simulation modules

pub mod combat;
pub mod input;
pub mod physics;
pub mod respawn;
pub mod sim;
pub mod snapshot;
pub mod world;

pub use sim::{SimHandle, Simulation};
