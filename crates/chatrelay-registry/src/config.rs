//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Rooms advertised when no explicit list is configured.
pub const DEFAULT_ROOMS: [&str; 4] = ["Red Team", "Blue Team", "General", "Random"];

/// Configuration for the registry task.
///
/// The room list is fixed for the lifetime of the process. It only
/// controls what `rooms` advertises on connect; messages may name any
/// room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Room names to advertise. May be empty.
    pub rooms: Vec<String>,

    /// Capacity of the registry's inbound command channel. Sessions wait
    /// when it is full.
    pub command_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rooms: DEFAULT_ROOMS.iter().map(|r| r.to_string()).collect(),
            command_buffer: 256,
        }
    }
}
