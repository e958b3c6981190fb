// crates/clipmark-core/src/config.rs
//
// Runtime tunables. Persisted by the shell between sessions and overridable
// from the command line.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Nominal playback rate for every viewer.
    pub fps:                u32,
    /// Quiet period after the last index change before a decode is issued.
    pub debounce_ms:        u64,
    /// Match documents show at most this many target viewers.
    pub max_target_viewers: usize,
    /// Decoded frames wider than this are scaled down (aspect preserved).
    pub max_frame_width:    u32,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            fps:                30,
            debounce_ms:        50,
            max_target_viewers: 10,
            max_frame_width:    640,
        }
    }
}

impl AnnotatorConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
