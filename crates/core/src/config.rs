//! Application configuration.
//!
//! Settings are read from a TOML file. Every field has a default, so a missing
//! file or a partial file is fine:
//!
//! ```toml
//! resolution = [1280, 720]
//! vsync = false
//! frames_in_flight = 2
//!
//! [textures]
//! skybox = "assets/textures/night_sky.png"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Paths of the textures sampled by the shadertoy pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub torus: PathBuf,
    pub skybox: PathBuf,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            torus: PathBuf::from("assets/textures/torus.png"),
            skybox: PathBuf::from("assets/textures/skybox.png"),
        }
    }
}

/// Top-level settings for a shadertoy session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Desired surface resolution in pixels. Established once at startup.
    pub resolution: [u32; 2],
    /// Present with FIFO when set, otherwise prefer MAILBOX or IMMEDIATE.
    pub vsync: bool,
    /// Number of frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Enable the Khronos validation layer.
    pub validation: bool,
    /// Use this physical device instead of the best-scored one.
    pub physical_device_index: Option<usize>,
    /// Artificial CPU work per frame, in milliseconds.
    pub simulated_cpu_work_ms: u64,
    /// Directory holding compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
    pub textures: TextureConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Local Shadertoy".to_string(),
            resolution: [1280, 720],
            vsync: true,
            frames_in_flight: 3,
            validation: cfg!(debug_assertions),
            physical_device_index: None,
            simulated_cpu_work_ms: 0,
            shader_dir: PathBuf::from("shaders/spirv"),
            textures: TextureConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|source| Error::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or holds
    /// unusable values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents, path)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot drive a session.
    pub fn validate(&self) -> Result<()> {
        if self.resolution[0] == 0 || self.resolution[1] == 0 {
            return Err(Error::Config(format!(
                "resolution must be non-zero, got {}x{}",
                self.resolution[0], self.resolution[1]
            )));
        }
        if self.frames_in_flight == 0 {
            return Err(Error::Config(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.resolution[0]
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.resolution[1]
    }

    /// The artificial per-frame CPU delay, if any.
    pub fn simulated_cpu_work(&self) -> Option<Duration> {
        (self.simulated_cpu_work_ms > 0).then(|| Duration::from_millis(self.simulated_cpu_work_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.resolution, [1280, 720]);
        assert!(config.vsync);
        assert_eq!(config.frames_in_flight, 3);
        assert!(config.simulated_cpu_work().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            "vsync = false\n[textures]\nskybox = \"sky.png\"\n",
            Path::new("test.toml"),
        )
        .unwrap();

        assert!(!config.vsync);
        assert_eq!(config.resolution, [1280, 720]);
        assert_eq!(config.textures.skybox, PathBuf::from("sky.png"));
        assert_eq!(config.textures.torus, TextureConfig::default().torus);
    }

    #[test]
    fn test_simulated_cpu_work() {
        let config =
            AppConfig::from_toml_str("simulated_cpu_work_ms = 8", Path::new("test.toml")).unwrap();
        assert_eq!(config.simulated_cpu_work(), Some(Duration::from_millis(8)));
    }

    #[test]
    fn test_rejects_zero_frames_in_flight() {
        let result = AppConfig::from_toml_str("frames_in_flight = 0", Path::new("test.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_resolution() {
        let result = AppConfig::from_toml_str("resolution = [0, 720]", Path::new("test.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let result = AppConfig::from_toml_str("vsync = ", Path::new("broken.toml"));
        match result {
            Err(Error::ConfigParse { path, .. }) => assert_eq!(path, PathBuf::from("broken.toml")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config =
            AppConfig::load_or_default(Path::new("definitely/not/here/shadertoy.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
