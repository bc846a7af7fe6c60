//! Tunables for a mounted globe, parsed from the JSON string the host page
//! passes to `mount`. Every field is optional; omitted ones keep defaults.

use gpu::{CameraConfig, Lighting};
use runtime::{PulseConfig, RotationConfig};
use scene::curves::CurveConfig;
use scene::landmass::LandmassConfig;
use scene::markers::MarkerConfig;
use scene::prefabs::GlobeStyle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    pub globe: GlobeStyle,
    pub landmass: LandmassConfig,
    pub markers: MarkerConfig,
    pub curves: CurveConfig,
    pub rotation: RotationConfig,
    pub pulse: PulseConfig,
    pub camera: CameraConfig,
    pub lighting: Lighting,
}

#[derive(Debug)]
pub enum ConfigError {
    Json(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Json(msg) => write!(f, "invalid globe config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl GlobeConfig {
    /// A blank string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, GlobeConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_is_default() {
        assert_eq!(GlobeConfig::from_json("").unwrap(), GlobeConfig::default());
        assert_eq!(GlobeConfig::from_json("  \n").unwrap(), GlobeConfig::default());
    }

    #[test]
    fn partial_fields_keep_defaults() {
        let config = GlobeConfig::from_json(
            r#"{ "curves": { "close_loop": false }, "rotation": { "damping": 0.1 } }"#,
        )
        .unwrap();
        let defaults = GlobeConfig::default();

        assert!(!config.curves.close_loop);
        assert_eq!(config.curves.tube_radius, defaults.curves.tube_radius);
        assert_eq!(config.rotation.damping, 0.1);
        assert_eq!(
            config.rotation.snap_threshold_rad,
            defaults.rotation.snap_threshold_rad
        );
        assert_eq!(config.landmass, defaults.landmass);
        assert_eq!(config.camera, defaults.camera);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = GlobeConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("invalid globe config"));
    }
}
