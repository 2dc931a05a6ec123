//! Engine configuration as data.
//!
//! [`EngineConfig`] gathers the grid geometry, panel minimums, gesture
//! thresholds, and default snap distance, and loads from TOML or JSON.
//! Every section is `#[serde(default)]`, so a file only names what it
//! overrides.
//!
//! ```toml
//! [grid]
//! columns = 24
//! row_height_px = 20
//!
//! [panel]
//! min_w = 2
//!
//! [gesture]
//! snap_distance_px = 30
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::load_validated_toml("panelgrid.toml")?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::controller::{DEFAULT_DRAG_THRESHOLD_PX, DEFAULT_UPDATE_HYSTERESIS_PX};
use crate::error::ConfigError;
use crate::grid::{GridConfig, GridLimits};

/// Minimum size every panel is clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelLimitsConfig {
    pub min_w: u16,
    pub min_h: u16,
}

impl Default for PanelLimitsConfig {
    fn default() -> Self {
        Self { min_w: 3, min_h: 3 }
    }
}

/// Pointer gesture tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Pointer travel in pixels before a press becomes a drag or resize.
    pub drag_threshold_px: u16,
    /// Minimum travel in pixels between two live updates.
    pub update_hysteresis_px: u16,
    /// Snap distance for targets that do not declare their own.
    pub snap_distance_px: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            update_hysteresis_px: DEFAULT_UPDATE_HYSTERESIS_PX,
            snap_distance_px: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub panel: PanelLimitsConfig,
    pub gesture: GestureConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Load TOML and reject values that [`Self::validate`] flags.
    pub fn load_validated_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)?.validated()
    }

    /// Load JSON and reject values that [`Self::validate`] flags.
    pub fn load_validated_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_file(path)?.validated()
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Every constraint violation, empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.grid.columns == 0 {
            errors.push("grid.columns must be > 0".to_string());
        }
        if self.grid.row_height_px == 0 {
            errors.push("grid.row_height_px must be > 0".to_string());
        }
        if self.panel.min_w == 0 {
            errors.push("panel.min_w must be > 0".to_string());
        }
        if self.panel.min_h == 0 {
            errors.push("panel.min_h must be > 0".to_string());
        }
        if self.panel.min_w > self.grid.columns {
            errors.push(format!(
                "panel.min_w ({}) exceeds grid.columns ({})",
                self.panel.min_w, self.grid.columns
            ));
        }
        if self.gesture.drag_threshold_px == 0 {
            errors.push("gesture.drag_threshold_px must be > 0".to_string());
        }
        if self.gesture.update_hysteresis_px == 0 {
            errors.push("gesture.update_hysteresis_px must be > 0".to_string());
        }
        errors
    }

    #[must_use]
    pub const fn limits(&self) -> GridLimits {
        GridLimits::new(self.grid.columns, self.panel.min_w, self.panel.min_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.grid.columns, 12);
        assert_eq!(config.grid.row_height_px, 30);
        assert_eq!(config.limits(), GridLimits::new(12, 3, 3));
        assert_eq!(config.gesture.snap_distance_px, 20);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [grid]
            columns = 24

            [gesture]
            snap_distance_px = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.columns, 24);
        assert_eq!(config.grid.margin_px, 10);
        assert_eq!(config.gesture.snap_distance_px, 30);
        assert_eq!(config.gesture.drag_threshold_px, DEFAULT_DRAG_THRESHOLD_PX);
    }

    #[test]
    fn json_round_trip() {
        let config = EngineConfig {
            panel: PanelLimitsConfig { min_w: 2, min_h: 4 },
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn validation_collects_every_problem() {
        let config = EngineConfig::from_toml_str(
            r#"
            [grid]
            columns = 2
            [gesture]
            drag_threshold_px = 0
            "#,
        )
        .unwrap();
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(matches!(config.validated(), Err(ConfigError::Validation(e)) if e.len() == 2));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("[grid\ncolumns = "),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[panel]\nmin_h = 5").unwrap();
        let config = EngineConfig::load_validated_toml(file.path()).unwrap();
        assert_eq!(config.panel.min_h, 5);
        assert!(matches!(
            EngineConfig::from_json_file("/nonexistent/panelgrid.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
