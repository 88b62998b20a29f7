use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("SWARM_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3003)
}

// When unset, sessions live in the in-process store only.
pub fn store_service_url() -> Option<String> {
    env::var("SESSION_STORE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

pub fn store_timeout() -> Duration {
    let millis = env::var("SESSION_STORE_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1500);
    Duration::from_millis(millis)
}

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
// Puck samples plus per-report intent echoes; sized above the world-update
// case so bursts of intent traffic don't lag slow consumers immediately.
pub const UPDATE_BROADCAST_CAPACITY: usize = 256;

// ~30 Hz fixed tick for every session engine.
pub const TICK_INTERVAL: Duration = Duration::from_millis(33);
