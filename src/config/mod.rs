//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (empty = any origin)
    pub client_origins: Vec<String>,
    /// Max inbound messages per second per session
    pub input_rate_limit: u32,
    /// Simulation tuning
    pub game: GameConfig,
}

/// Simulation tuning. Every value can be overridden from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Physics/collision step
    pub fine_tick: Duration,
    /// Snapshot broadcast interval
    pub snapshot_tick: Duration,
    /// Minimum time between two shots (ms)
    pub fire_cooldown_ms: u64,
    /// Projectile speed (units per second)
    pub projectile_speed: f32,
    /// Projectile lifetime (ms)
    pub projectile_lifetime_ms: u64,
    /// Health on spawn, also the health ceiling
    pub spawn_health: i32,
    pub max_ammo: u32,
    pub damage_per_hit: i32,
    /// Projectile/player hit distance (units)
    pub hit_radius: f32,
    pub respawn_delay_ms: u64,
    /// Half-width of the square players spawn in
    pub spawn_extent: f32,
    /// Eye height players spawn at
    pub spawn_height: f32,
    /// Caps how far a single input may move a player (units per second).
    /// `None` trusts client-reported positions.
    pub max_move_speed: Option<f32>,
    /// Seed for spawn position RNG (`None` = random)
    pub world_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fine_tick: Duration::from_millis(20),
            snapshot_tick: Duration::from_millis(50),
            fire_cooldown_ms: 150,
            projectile_speed: 40.0,
            projectile_lifetime_ms: 2000,
            spawn_health: 100,
            max_ammo: 12,
            damage_per_hit: 30,
            hit_radius: 1.2,
            respawn_delay_ms: 2000,
            spawn_extent: 5.0,
            spawn_height: 1.6,
            max_move_speed: None,
            world_seed: None,
        }
    }
}

impl GameConfig {
    /// Fine tick length in seconds, used as the physics `dt`
    pub fn tick_delta(&self) -> f32 {
        self.fine_tick.as_secs_f32()
    }

    /// Build tuning from a key lookup, falling back to defaults for missing keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = Self::default();

        let fine_tick_ms: u64 = parse_or(&lookup, "FINE_TICK_MS", 20)?;
        let snapshot_tick_ms: u64 = parse_or(&lookup, "SNAPSHOT_TICK_MS", 50)?;
        if fine_tick_ms == 0 {
            return Err(ConfigError::Invalid("FINE_TICK_MS", "must be greater than zero"));
        }
        if snapshot_tick_ms == 0 {
            return Err(ConfigError::Invalid("SNAPSHOT_TICK_MS", "must be greater than zero"));
        }

        let config = Self {
            fine_tick: Duration::from_millis(fine_tick_ms),
            snapshot_tick: Duration::from_millis(snapshot_tick_ms),
            fire_cooldown_ms: parse_or(&lookup, "FIRE_COOLDOWN_MS", defaults.fire_cooldown_ms)?,
            projectile_speed: parse_or(&lookup, "PROJECTILE_SPEED", defaults.projectile_speed)?,
            projectile_lifetime_ms: parse_or(
                &lookup,
                "PROJECTILE_LIFETIME_MS",
                defaults.projectile_lifetime_ms,
            )?,
            spawn_health: parse_or(&lookup, "SPAWN_HEALTH", defaults.spawn_health)?,
            max_ammo: parse_or(&lookup, "MAX_AMMO", defaults.max_ammo)?,
            damage_per_hit: parse_or(&lookup, "DAMAGE_PER_HIT", defaults.damage_per_hit)?,
            hit_radius: parse_or(&lookup, "HIT_RADIUS", defaults.hit_radius)?,
            respawn_delay_ms: parse_or(&lookup, "RESPAWN_DELAY_MS", defaults.respawn_delay_ms)?,
            spawn_extent: parse_or(&lookup, "SPAWN_EXTENT", defaults.spawn_extent)?,
            spawn_height: parse_or(&lookup, "SPAWN_HEIGHT", defaults.spawn_height)?,
            max_move_speed: parse_opt(&lookup, "MAX_MOVE_SPEED")?,
            world_seed: parse_opt(&lookup, "WORLD_SEED")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.projectile_speed.is_finite() && self.projectile_speed > 0.0) {
            return Err(ConfigError::Invalid("PROJECTILE_SPEED", "must be a positive number"));
        }
        if !(self.hit_radius.is_finite() && self.hit_radius > 0.0) {
            return Err(ConfigError::Invalid("HIT_RADIUS", "must be a positive number"));
        }
        if self.spawn_health <= 0 {
            return Err(ConfigError::Invalid("SPAWN_HEALTH", "must be greater than zero"));
        }
        if self.damage_per_hit < 0 {
            return Err(ConfigError::Invalid("DAMAGE_PER_HIT", "must not be negative"));
        }
        if !(self.spawn_extent.is_finite() && self.spawn_extent >= 0.0) {
            return Err(ConfigError::Invalid("SPAWN_EXTENT", "must not be negative"));
        }
        if !self.spawn_height.is_finite() {
            return Err(ConfigError::Invalid("SPAWN_HEIGHT", "must be a finite number"));
        }
        if let Some(speed) = self.max_move_speed {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(ConfigError::Invalid("MAX_MOVE_SPEED", "must be a positive number"));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let input_rate_limit: u32 = parse_or(&lookup, "INPUT_RATE_LIMIT", 60)?;
        if input_rate_limit == 0 {
            return Err(ConfigError::Invalid("INPUT_RATE_LIMIT", "must be greater than zero"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origins,
            input_rate_limit,
            game: GameConfig::from_lookup(&lookup)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Unparseable(key, raw)),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Unparseable(&'static str, String),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_cadence() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.game, GameConfig::default());
        assert_eq!(config.game.fine_tick, Duration::from_millis(20));
        assert_eq!(config.game.snapshot_tick, Duration::from_millis(50));
        assert_eq!(config.game.max_ammo, 12);
        assert!(config.client_origins.is_empty());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "4100"),
            ("SERVER_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 4100);
    }

    #[test]
    fn tuning_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("FIRE_COOLDOWN_MS", "250"),
            ("MAX_AMMO", "30"),
            ("HIT_RADIUS", "0.75"),
            ("MAX_MOVE_SPEED", "6"),
            ("WORLD_SEED", "42"),
            ("CLIENT_ORIGIN", "http://a.test, http://b.test"),
        ]))
        .unwrap();
        assert_eq!(config.game.fire_cooldown_ms, 250);
        assert_eq!(config.game.max_ammo, 30);
        assert_eq!(config.game.hit_radius, 0.75);
        assert_eq!(config.game.max_move_speed, Some(6.0));
        assert_eq!(config.game.world_seed, Some(42));
        assert_eq!(config.client_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("MAX_AMMO", "lots")])),
            Err(ConfigError::Unparseable("MAX_AMMO", _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("FINE_TICK_MS", "0")])),
            Err(ConfigError::Invalid("FINE_TICK_MS", _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("HIT_RADIUS", "-1")])),
            Err(ConfigError::Invalid("HIT_RADIUS", _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("SERVER_ADDR", "nowhere")])),
            Err(ConfigError::InvalidAddress)
        ));
    }
}
