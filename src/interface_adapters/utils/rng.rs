use std::{
    sync::{
        LazyLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

// Seeded from the clock once, then strictly incremented, so ids stay unique
// within a running server even when many are minted in the same instant.
static COUNTER: LazyLock<AtomicU64> = LazyLock::new(|| {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    AtomicU64::new(nanos)
});

/// Returns a process-unique, monotonically increasing identifier for
/// connections and participants.
pub fn next_id() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
