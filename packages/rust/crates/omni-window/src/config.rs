//! Engine timing and threshold configuration.

use serde::{Deserialize, Serialize};

use crate::locator::LocatorSettings;

/// Timing constants and thresholds. Every field has a default, so a partial
/// settings section deserializes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of boot mode after binding.
    pub boot_window_ms: u64,
    /// Trailing debounce in steady mode.
    pub debounce_ms: u64,
    /// Upper bound on how long a debounce may keep sliding.
    pub debounce_max_wait_ms: u64,
    /// Visual frame interval.
    pub frame_interval_ms: u64,
    /// Period of the latched-run catch-up.
    pub flush_interval_ms: u64,
    /// Hold after the last composer input.
    pub typing_grace_ms: u64,
    /// Suppression safety window.
    pub suppression_window_ms: u64,
    /// Host time one batch slice may use.
    pub slice_budget_ms: u64,
    /// Gap between slices.
    pub slice_gap_ms: u64,
    /// Locator cache lifetime.
    pub locator_cache_ttl_ms: u64,
    /// Distance from the bottom still counted as pinned.
    pub scroll_pin_threshold_px: f64,
    /// Minimum text length of a structural candidate.
    pub structural_min_text_len: usize,
    /// Structural candidates taller than this share of the page are ignored.
    pub structural_max_height_fraction: f64,
    /// Fewer located turns than this defers the evaluation.
    pub min_turns: usize,
    /// Timer callbacks one `advance` call may run.
    pub max_timer_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            boot_window_ms: 1500,
            debounce_ms: 80,
            debounce_max_wait_ms: 320,
            frame_interval_ms: 16,
            flush_interval_ms: 250,
            typing_grace_ms: 600,
            suppression_window_ms: 300,
            slice_budget_ms: 6,
            slice_gap_ms: 1,
            locator_cache_ttl_ms: 50,
            scroll_pin_threshold_px: 48.0,
            structural_min_text_len: 1,
            structural_max_height_fraction: 0.9,
            min_turns: 1,
            max_timer_iterations: 4096,
        }
    }
}

impl EngineConfig {
    /// Locator tuning derived from this config.
    #[must_use]
    pub fn locator_settings(&self) -> LocatorSettings {
        LocatorSettings {
            cache_ttl_ms: self.locator_cache_ttl_ms,
            min_text_len: self.structural_min_text_len,
            max_height_fraction: self.structural_max_height_fraction,
        }
    }

    /// First frame boundary strictly after `now_ms`.
    #[must_use]
    pub fn next_frame(&self, now_ms: u64) -> u64 {
        let frame = self.frame_interval_ms.max(1);
        (now_ms / frame + 1) * frame
    }
}
