//! # Server Stats
//!
//! Lightweight counters behind INFO: connected clients and total commands
//! processed, plus the process start instant for uptime. Relaxed atomics
//! are enough; the fields are independent gauges with no cross-field
//! ordering requirement.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct ServerStats {
    started: Instant,
    connected_clients: AtomicUsize,
    commands_processed: AtomicU64,
}

/// Point-in-time view for INFO rendering.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub connected_clients: usize,
    pub commands_processed: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        ServerStats {
            started: Instant::now(),
            connected_clients: AtomicUsize::new(0),
            commands_processed: AtomicU64::new(0),
        }
    }

    pub fn client_connected(&self) {
        self.connected_clients.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_disconnected(&self) {
        self.connected_clients.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            connected_clients: self.connected_clients.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ServerStats::new();
        stats.client_connected();
        stats.client_connected();
        stats.client_disconnected();
        stats.command_processed();
        stats.command_processed();
        stats.command_processed();

        let snap = stats.snapshot();
        assert_eq!(snap.connected_clients, 1);
        assert_eq!(snap.commands_processed, 3);
    }
}
