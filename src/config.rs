use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::Mat4;
use log::info;
use serde::{Deserialize, Serialize};

use crate::light::{mat4_from_rows, Light, Material, DEFAULT_LIGHT_VIEW_ROWS};
use crate::scene::FLOOR_SCALE;

/// Names a JSON file overriding any subset of [`DemoConfig`].
pub const CONFIG_ENV_VAR: &str = "SHADOWMAP_DEMO_CONFIG";

/// Tunables of the demo. The defaults reproduce the reference scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Edge length of the square depth attachment.
    pub shadow_map_size: u32,
    pub poll_interval_ms: u64,
    pub floor_scale: f32,
    pub light: LightConfig,
    pub material: Material,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window_width: 1024,
            window_height: 768,
            shadow_map_size: 2048,
            poll_interval_ms: 1,
            floor_scale: FLOOR_SCALE,
            light: LightConfig::default(),
            material: Material::default(),
        }
    }
}

impl DemoConfig {
    /// Defaults, overridden by the file named in [`CONFIG_ENV_VAR`] if set.
    pub fn from_env() -> Result<Self> {
        match env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        anyhow::ensure!(config.shadow_map_size > 0, "shadow_map_size must be positive");
        anyhow::ensure!(
            config.window_width > 0 && config.window_height > 0,
            "window size must be positive"
        );
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Perspective and placement of the shadow casting light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// View transform, row-major.
    pub view_rows: [[f32; 4]; 4],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            near: 0.01,
            far: 10000.0,
            view_rows: DEFAULT_LIGHT_VIEW_ROWS,
        }
    }
}

impl LightConfig {
    /// Square-aspect projection matching the square shadow map.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), 1.0, self.near, self.far)
    }

    pub fn light(&self) -> Light {
        Light::new(self.projection(), mat4_from_rows(&self.view_rows))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use glam::Vec3;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn defaults_match_reference_scene() {
        let config = DemoConfig::default();
        assert_eq!(config.shadow_map_size, 2048);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.floor_scale, 0.35);
        assert_eq!(config.material.specular_exp, 50.0);
        assert_eq!(config.light.view_rows, DEFAULT_LIGHT_VIEW_ROWS);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = DemoConfig::from_json_str(
            r#"{ "shadow_map_size": 512, "light": { "fov_y_degrees": 60.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.shadow_map_size, 512);
        assert_eq!(config.light.fov_y_degrees, 60.0);
        assert_eq!(config.light.far, 10000.0);
        assert_eq!(config.window_width, 1024);
    }

    #[test]
    fn material_colours_deserialize_from_arrays() {
        let config = DemoConfig::from_json_str(
            r#"{ "material": { "ambient": [0.1, 0.2, 0.3], "diffuse": [1, 1, 1],
                               "specular": [0, 0, 0], "specular_exp": 8 } }"#,
        )
        .unwrap();
        assert_eq!(config.material.ambient, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(config.material.specular_exp, 8.0);
    }

    #[test]
    fn rejects_zero_shadow_map() {
        assert!(DemoConfig::from_json_str(r#"{ "shadow_map_size": 0 }"#).is_err());
        assert!(DemoConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn reads_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "poll_interval_ms": 16 }"#).unwrap();
        let config = DemoConfig::from_file(file.path()).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(16));
    }

    #[test]
    fn light_uses_configured_view() {
        let light = LightConfig::default().light();
        assert_eq!(light.view, mat4_from_rows(&DEFAULT_LIGHT_VIEW_ROWS));
    }
}
