//! Configuration structs for the queue/playlist/state-file stack. Plain
//! serde structs, deserialized from whatever config format the daemon
//! uses (not this crate's concern).

use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

fn default_max_length() -> usize {
    16384
}

fn default_debounce() -> Duration {
    Duration::from_secs(2)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFileConfig {
    pub path: Utf8PathBuf,

    /// How long to wait after a change before writing the state file, so
    /// a burst of edits only costs one write.
    #[serde(default = "default_debounce", with = "duration_secs")]
    pub debounce: Duration,

    /// Whether playback should resume (as opposed to stay paused) on
    /// startup if the saved state was mid-playback.
    #[serde(default)]
    pub restore_paused: bool,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub name: String,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_config_default_max_length_is_16384() {
        assert_eq!(QueueConfig::default().max_length, 16384);
    }

    #[test]
    fn state_file_config_keeps_explicit_debounce() {
        let config = StateFileConfig {
            path: Utf8PathBuf::from("/var/lib/mpd/state"),
            debounce: Duration::from_secs(5),
            restore_paused: true,
        };
        assert_eq!(config.debounce, Duration::from_secs(5));
        assert!(config.restore_paused);
    }
}
