//! Configuration management
//!
//! Loading, parsing, and validating the TOML configuration file. Settings
//! cover tiling geometry, animation timing, transaction sweeping, focus
//! behavior, and decoration metrics.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration struct containing all settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Tiling layout settings
    #[serde(default)]
    pub tiling: TilingConfig,

    /// Animation settings
    #[serde(default)]
    pub animation: AnimationConfig,

    /// Transaction coordinator settings
    #[serde(default)]
    pub transaction: TransactionConfig,

    /// Focus behavior
    #[serde(default)]
    pub focus: FocusConfig,

    /// Decoration metrics consumed by the layout pass
    #[serde(default)]
    pub decoration: DecorationConfig,
}

/// Tiling layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TilingConfig {
    /// Gap between adjacent tiled windows (pixels)
    #[serde(default = "TilingConfig::default_gap_inner")]
    pub gap_inner: i32,

    /// Gap between tiled windows and the usable-area edge (pixels)
    #[serde(default = "TilingConfig::default_gap_outer")]
    pub gap_outer: i32,

    /// Ratio of the first child at every split (0.1-0.9). Used both when a
    /// split is created and on every recompute.
    #[serde(default = "TilingConfig::default_split_ratio")]
    pub split_ratio: f64,
}

impl TilingConfig {
    fn default_gap_inner() -> i32 {
        0
    }
    fn default_gap_outer() -> i32 {
        0
    }
    fn default_split_ratio() -> f64 {
        0.5
    }
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            gap_inner: Self::default_gap_inner(),
            gap_outer: Self::default_gap_outer(),
            split_ratio: Self::default_split_ratio(),
        }
    }
}

/// Animation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimationConfig {
    /// Enable animations
    #[serde(default = "AnimationConfig::default_enabled")]
    pub enabled: bool,

    /// Default animation duration (milliseconds)
    #[serde(default = "AnimationConfig::default_duration_ms")]
    pub duration_ms: u32,

    /// Easing curve ("linear", "ease-in", "ease-out", "ease-in-out")
    #[serde(default = "AnimationConfig::default_curve")]
    pub curve: String,
}

impl AnimationConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_duration_ms() -> u32 {
        200
    }
    fn default_curve() -> String {
        "ease-out".to_string()
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            duration_ms: Self::default_duration_ms(),
            curve: Self::default_curve(),
        }
    }
}

/// Transaction coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionConfig {
    /// Sweep timer interval (milliseconds)
    #[serde(default = "TransactionConfig::default_sweep_interval_ms")]
    pub sweep_interval_ms: u32,

    /// Force-apply a transaction after this many un-ready sweeps, so a
    /// non-responding client can never stall layout forever.
    #[serde(default = "TransactionConfig::default_force_apply_after")]
    pub force_apply_after: u32,
}

impl TransactionConfig {
    fn default_sweep_interval_ms() -> u32 {
        200
    }
    fn default_force_apply_after() -> u32 {
        5
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: Self::default_sweep_interval_ms(),
            force_apply_after: Self::default_force_apply_after(),
        }
    }
}

/// Focus behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FocusConfig {
    /// Focus follows mouse
    #[serde(default)]
    pub focus_follows_mouse: bool,
}

/// Decoration metrics. Painting is done elsewhere; the layout pass only
/// needs the sizes to subtract when mapping a leaf box onto a toplevel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecorationConfig {
    /// Border width on left/right/bottom edges (pixels)
    #[serde(default = "DecorationConfig::default_border_width")]
    pub border_width: i32,

    /// Titlebar height added above the content (pixels)
    #[serde(default = "DecorationConfig::default_top_border")]
    pub top_border: i32,
}

impl DecorationConfig {
    fn default_border_width() -> i32 {
        1
    }
    fn default_top_border() -> i32 {
        0
    }
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            border_width: Self::default_border_width(),
            top_border: Self::default_top_border(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate values against sane ranges.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.1..=0.9).contains(&self.tiling.split_ratio),
            "tiling.split_ratio must be within 0.1-0.9, got {}",
            self.tiling.split_ratio
        );
        anyhow::ensure!(
            self.tiling.gap_inner >= 0 && self.tiling.gap_outer >= 0,
            "tiling gaps must be non-negative"
        );
        anyhow::ensure!(
            self.animation.duration_ms > 0,
            "animation.duration_ms must be positive"
        );
        anyhow::ensure!(
            self.transaction.sweep_interval_ms > 0,
            "transaction.sweep_interval_ms must be positive"
        );
        anyhow::ensure!(
            self.transaction.force_apply_after > 0,
            "transaction.force_apply_after must be positive"
        );
        anyhow::ensure!(
            self.decoration.border_width >= 0 && self.decoration.top_border >= 0,
            "decoration metrics must be non-negative"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests;
