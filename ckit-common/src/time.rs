//! Wall-clock helpers. Expiration deadlines and last-access stamps use
//! millisecond unix time; the snapshot header records seconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in milliseconds.
pub fn unix_ms() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}

/// Current unix time in whole seconds.
pub fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_and_secs_agree() {
        let ms = unix_ms();
        let secs = unix_secs();
        let diff = (ms / 1000 - secs as i64).abs();
        assert!(diff <= 1, "clock reads {ms}ms vs {secs}s");
    }
}
