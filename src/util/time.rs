//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Monotonic milliseconds since server start. Drives the simulation clock,
/// so wall-clock adjustments can't reorder deadlines.
pub fn server_millis() -> u64 {
    SERVER_START.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_millis_is_monotonic_enough() {
        let a = unix_millis();
        let b = unix_millis();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000);
    }

    #[test]
    fn server_millis_never_goes_backwards() {
        let mut last = server_millis();
        for _ in 0..1_000 {
            let now = server_millis();
            assert!(now >= last);
            last = now;
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(server_millis() >= last + 5);
    }

    #[test]
    fn uptime_starts_near_zero() {
        init_server_time();
        assert!(uptime_secs() < 60);
    }
}
