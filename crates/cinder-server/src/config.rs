//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for a server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path of the append-only log. `None` disables persistence:
    /// writes are accepted but not durable across restarts.
    pub aof_path: Option<PathBuf>,

    /// How often the background task fsyncs the append-only log.
    /// Bounds crash loss to roughly one interval of unflushed writes.
    pub sync_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            aof_path: None,
            sync_interval: Duration::from_secs(1),
        }
    }
}
