//! Unit tests for configuration parsing and validation.

use super::*;
use anyhow::Result;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.tiling.split_ratio, 0.5);
    assert_eq!(config.transaction.sweep_interval_ms, 200);
    assert_eq!(config.transaction.force_apply_after, 5);
}

#[test]
fn partial_toml_fills_defaults() -> Result<()> {
    let config: Config = toml::from_str(
        r#"
        [tiling]
        gap_inner = 8

        [animation]
        duration_ms = 150
        "#,
    )?;
    assert_eq!(config.tiling.gap_inner, 8);
    assert_eq!(config.tiling.gap_outer, 0);
    assert_eq!(config.tiling.split_ratio, 0.5);
    assert_eq!(config.animation.duration_ms, 150);
    assert_eq!(config.animation.curve, "ease-out");
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn empty_toml_is_default() -> Result<()> {
    let config: Config = toml::from_str("")?;
    assert_eq!(config, Config::default());
    Ok(())
}

#[test]
fn out_of_range_split_ratio_rejected() -> Result<()> {
    let config: Config = toml::from_str(
        r#"
        [tiling]
        split_ratio = 0.95
        "#,
    )?;
    assert!(config.validate().is_err());
    Ok(())
}

#[test]
fn negative_gap_rejected() -> Result<()> {
    let config: Config = toml::from_str(
        r#"
        [tiling]
        gap_outer = -4
        "#,
    )?;
    assert!(config.validate().is_err());
    Ok(())
}

#[test]
fn zero_sweep_interval_rejected() -> Result<()> {
    let config: Config = toml::from_str(
        r#"
        [transaction]
        sweep_interval_ms = 0
        "#,
    )?;
    assert!(config.validate().is_err());
    Ok(())
}

#[test]
fn config_round_trips_through_toml() -> Result<()> {
    let mut config = Config::default();
    config.tiling.gap_inner = 6;
    config.tiling.split_ratio = 0.6;
    config.focus.focus_follows_mouse = true;

    let serialized = toml::to_string(&config)?;
    let parsed: Config = toml::from_str(&serialized)?;
    assert_eq!(parsed, config);
    Ok(())
}
