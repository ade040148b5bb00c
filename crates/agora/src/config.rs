use serde::Deserialize;

/// Engine tuning knobs.
///
/// Every field has a default, so a partial document (or none at all)
/// deserializes into a working configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Commands buffered in the ingress channel before `submit` waits.
    pub channel_capacity: usize,
    /// Events buffered on the bus before slow subscribers lag.
    pub bus_capacity: usize,
    /// Fail post sharing with `InvalidRecipient` instead of skipping silently.
    pub strict_sharing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            bus_capacity: 10000,
            strict_sharing: false,
        }
    }
}
