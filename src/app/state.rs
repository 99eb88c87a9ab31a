//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{SimHandle, Simulation};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sim: SimHandle,
}

impl AppState {
    /// Build the state along with the simulation task the caller must spawn
    pub fn new(config: Config) -> (Self, Simulation) {
        let config = Arc::new(config);
        let (simulation, sim) = Simulation::new(Arc::new(config.game.clone()));

        (Self { config, sim }, simulation)
    }
}
