//! Startup configuration
//!
//! Everything here has a compiled-in default. An optional TOML file can
//! override any subset of fields; the runtime tunables it seeds are never
//! written back.

use crate::camera::CameraSettings;
use crate::error::{EngineError, EngineResult};
use crate::renderer::Tunables;
use crate::terrain::TerrainSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up next to the working directory by the demo binary
pub const DEFAULT_CONFIG_FILE: &str = "strata.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Strata Engine".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Edge length of every shadow map in texels
    pub map_size: u32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self { map_size: 2048 }
    }
}

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowSettings,
    pub shadows: ShadowSettings,
    pub camera: CameraSettings,
    pub terrain: TerrainSettings,
    pub tunables: Tunables,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(raw).map_err(|e| EngineError::ConfigParse {
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Io {
            path: path.to_string_lossy().to_string(),
            error: e.to_string(),
        })?;
        log::info!("[EngineConfig::load] Loaded configuration from {}", path.display());
        Self::from_toml_str(&raw)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!(
                "[EngineConfig::load_or_default] {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(EngineError::InvalidConfig {
                message: format!(
                    "window size must be non-zero, got {}x{}",
                    self.window.width, self.window.height
                ),
            });
        }
        if !self.shadows.map_size.is_power_of_two() {
            return Err(EngineError::InvalidConfig {
                message: format!("shadow map size {} is not a power of two", self.shadows.map_size),
            });
        }
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(EngineError::InvalidConfig {
                message: format!(
                    "camera clip range {}..{} is invalid",
                    self.camera.near, self.camera.far
                ),
            });
        }
        if self.terrain.world_size <= 0.0 || self.terrain.height_scale <= 0.0 {
            return Err(EngineError::InvalidConfig {
                message: "terrain world size and height scale must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shadows.map_size, 2048);
        assert_eq!(config.terrain.world_size, 100.0);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            [window]
            width = 800

            [tunables]
            taa_alpha = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert!((config.tunables.taa_alpha - 0.2).abs() < f32::EPSILON);
        assert!((config.tunables.taa_clamp_expand - 0.05).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rejects_bad_shadow_size() {
        let err = EngineConfig::from_toml_str("[shadows]\nmap_size = 1000\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[terrain]\nheight_scale = 25.0").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.terrain.height_scale, 25.0);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
