//! Small utilities shared across the GreenMile crates.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current timestamp in seconds
pub fn timestamp_secs() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0));
    since_epoch.as_secs()
}
