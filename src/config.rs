//! Engine configuration.
//!
//! Grounded on `hlifealgo::setMaxMemory` in
//! `examples/original_source/gollybase/hlifealgo.cpp`, which clamps the
//! memory budget to `[10, 4000]` MB; loaded with `serde` + `toml` rather
//! than a hand-rolled parser.

use serde::{Deserialize, Serialize};

const MIN_MAX_MEMORY_MB: u32 = 10;
const MAX_MAX_MEMORY_MB: u32 = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Memory ceiling before the hash index stops growing and starts
    /// degrading instead (§4.4 "if the allocator cannot satisfy a resize").
    /// Clamped to `[10, 4000]` on construction, per `setMaxMemory`.
    pub max_memory_mb: u32,

    /// Initial hash table bucket count, rounded up to a power of two.
    pub initial_hash_capacity: usize,

    /// Load factor at which the hash index doubles its bucket count.
    pub max_load_factor: f64,

    /// `None` disables timeline recording; `Some(n)` records one frame
    /// every `n` calls to `step`.
    pub timeline_interval: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_memory_mb: 300,
            initial_hash_capacity: 1024,
            max_load_factor: 0.7,
            timeline_interval: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, crate::error::EngineError> {
        toml::from_str(text).map_err(|e| crate::error::EngineError::InternalInvariantViolation(format!("invalid config: {e}")))
    }

    /// Clamps `max_memory_mb` to the supported range, mirroring
    /// `setMaxMemory`'s own clamp rather than rejecting an out-of-range value.
    pub fn clamp_memory(&mut self) {
        self.max_memory_mb = self.max_memory_mb.clamp(MIN_MAX_MEMORY_MB, MAX_MAX_MEMORY_MB);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_clampable_without_changing() {
        let mut cfg = EngineConfig::default();
        let before = cfg.max_memory_mb;
        cfg.clamp_memory();
        assert_eq!(cfg.max_memory_mb, before);
    }

    #[test]
    fn memory_below_floor_is_raised() {
        let mut cfg = EngineConfig { max_memory_mb: 1, ..EngineConfig::default() };
        cfg.clamp_memory();
        assert_eq!(cfg.max_memory_mb, MIN_MAX_MEMORY_MB);
    }

    #[test]
    fn parses_from_toml() {
        let cfg = EngineConfig::from_toml("max_memory_mb = 500\ntimeline_interval = 100\n").unwrap();
        assert_eq!(cfg.max_memory_mb, 500);
        assert_eq!(cfg.timeline_interval, Some(100));
    }
}
