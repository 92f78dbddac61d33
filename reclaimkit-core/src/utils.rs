use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time elapsed since the Unix epoch. A clock set before the epoch reads as zero.
fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Current time in epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    u64::try_from(since_epoch().as_millis()).unwrap_or(u64::MAX)
}

/// Current time in epoch seconds.
pub(crate) fn now_secs() -> u64 {
    since_epoch().as_secs()
}
