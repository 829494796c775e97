//! Application configuration.
//!
//! Every section has a default, so an empty file (or no file) is a valid
//! configuration. CLI flags override individual fields after loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use forcelink_core::contact::ContactShape;
use forcelink_core::scene::{SceneConfig, SceneError};
use forcelink_native::bridge::DeviceConfig;
use forcelink_native::control::{ControlLoopConfig, Pacing};
use forcelink_native::streaming::TelemetryConfig;

/// Configuration errors. All abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path:?}: {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse TOML {path:?}: {source}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Scene parameters out of range
    #[error("invalid scene: {0}")]
    Scene(#[from] SceneError),

    /// Other parameter out of range
    #[error("invalid {name}: {reason}")]
    Invalid {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Renderer-side settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Snapshot polling rate (Hz)
    pub refresh_hz: f64,
    /// Multiplier from newtons to drawn arrow length; defaults by shape
    pub force_display_scale: Option<f64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            force_display_scale: None,
        }
    }
}

impl RenderConfig {
    /// Display scale for forces rendered against `shape`.
    pub fn force_display_scale(&self, shape: &ContactShape) -> f64 {
        self.force_display_scale.unwrap_or(match shape {
            ContactShape::Sphere { .. } => 0.01,
            ContactShape::Torus { .. } => 0.001,
        })
    }
}

/// Whole-application configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcelinkConfig {
    /// Shape, stiffness and body dynamics
    pub scene: SceneConfig,
    /// Device backend selection
    pub device: DeviceConfig,
    /// Control loop cadence and thread settings
    pub control: ControlLoopConfig,
    /// Telemetry addresses and precision
    pub telemetry: TelemetryConfig,
    /// Renderer-side settings
    pub render: RenderConfig,
}

impl ForcelinkConfig {
    /// Load from `path`, or defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// the result fails [`ForcelinkConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check parameters that would make the loop misbehave.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scene.validate()?;

        if let Pacing::Fixed { period_ms } = self.control.pacing {
            let usable = period_ms.is_finite()
                && period_ms > 0.0
                && self.control.pacing.period().is_some_and(|p| !p.is_zero());
            if !usable {
                return Err(ConfigError::Invalid {
                    name: "control.pacing.period_ms",
                    reason: format!("must be a positive number of milliseconds, got {period_ms}"),
                });
            }
        }
        if self.control.stats_interval_s.is_nan() || self.control.stats_interval_s < 0.0 {
            return Err(ConfigError::Invalid {
                name: "control.stats_interval_s",
                reason: format!("must not be negative, got {}", self.control.stats_interval_s),
            });
        }
        if !self.render.refresh_hz.is_finite() || self.render.refresh_hz <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "render.refresh_hz",
                reason: format!("must be positive, got {}", self.render.refresh_hz),
            });
        }

        Ok(())
    }

    /// Serialize as TOML.
    ///
    /// # Errors
    ///
    /// Fails only if a value has no TOML representation.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forcelink_native::bridge::DeviceKind;

    #[test]
    fn test_empty_file_is_default() {
        let config: ForcelinkConfig = toml::from_str("").unwrap();
        assert_eq!(config, ForcelinkConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let text = r#"
            [scene]
            stiffness = 500.0

            [scene.shape]
            kind = "sphere"
            radius = 0.04

            [device]
            kind = "emulate"

            [control.pacing]
            mode = "fixed"
            period_ms = 50.0
        "#;
        let config: ForcelinkConfig = toml::from_str(text).unwrap();

        assert_eq!(config.scene.shape, ContactShape::Sphere { radius: 0.04 });
        assert!((config.scene.stiffness - 500.0).abs() < 1e-12);
        assert!((config.scene.tool_radius - SceneConfig::default().tool_radius).abs() < 1e-12);
        assert_eq!(config.device.kind, DeviceKind::Emulate);
        assert_eq!(config.control.pacing, Pacing::Fixed { period_ms: 50.0 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = ForcelinkConfig::default();
        let text = config.to_toml().unwrap();
        let back: ForcelinkConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_rejects_bad_scene() {
        let mut config = ForcelinkConfig::default();
        config.scene.shape = ContactShape::Torus {
            outer_radius: 0.02,
            inner_radius: 0.03,
        };
        assert!(matches!(config.validate(), Err(ConfigError::Scene(_))));

        let mut config = ForcelinkConfig::default();
        config.scene.stiffness = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Scene(_))));
    }

    #[test]
    fn test_rejects_bad_render_rate() {
        let mut config = ForcelinkConfig::default();
        config.render.refresh_hz = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "render.refresh_hz", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_pacing_period() {
        for period_ms in [-5.0, 0.0, f64::NAN, f64::INFINITY, 1e-9] {
            let mut config = ForcelinkConfig::default();
            config.control.pacing = Pacing::Fixed { period_ms };
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::Invalid { name: "control.pacing.period_ms", .. })
                ),
                "period_ms = {period_ms} accepted"
            );
        }

        let mut config = ForcelinkConfig::default();
        config.control.pacing = Pacing::Fixed { period_ms: 1.0 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_pacing_in_file() {
        let text = "[control.pacing]\nmode = \"fixed\"\nperiod_ms = -1.0\n";
        let config: ForcelinkConfig = toml::from_str(text).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = ForcelinkConfig::load(Some(Path::new("/nonexistent/forcelink.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_display_scale_by_shape() {
        let render = RenderConfig::default();
        assert!((render.force_display_scale(&SceneConfig::sphere().shape) - 0.01).abs() < 1e-12);
        assert!((render.force_display_scale(&SceneConfig::torus().shape) - 0.001).abs() < 1e-12);
    }
}
