//! Engine configuration.

use std::path::PathBuf;

/// Startup configuration for the engine.
///
/// Every field has a sensible default; [`EngineConfig::from_env`] applies
/// `MIRAGE_*` environment overrides on top so the demo binary can be
/// reconfigured without rebuilding.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Initial window width in pixels.
    pub window_width: u32,
    /// Initial window height in pixels.
    pub window_height: u32,
    /// Window title.
    pub title: String,
    /// Enable Vulkan validation layers when available.
    pub validation: bool,
    /// Optional glTF model to load at startup.
    pub model_path: Option<PathBuf>,
    /// Directory containing compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            title: "Mirage".to_string(),
            validation: cfg!(debug_assertions),
            model_path: None,
            shader_dir: PathBuf::from("shaders/spirv"),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from defaults plus `MIRAGE_*` environment overrides.
    ///
    /// Recognized variables: `MIRAGE_WIDTH`, `MIRAGE_HEIGHT`, `MIRAGE_MODEL`,
    /// `MIRAGE_SHADER_DIR`, `MIRAGE_VALIDATION` (`0`/`1`).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(width) = env_u32("MIRAGE_WIDTH") {
            config.window_width = width;
        }
        if let Some(height) = env_u32("MIRAGE_HEIGHT") {
            config.window_height = height;
        }
        if let Ok(path) = std::env::var("MIRAGE_MODEL") {
            config.model_path = Some(PathBuf::from(path));
        }
        if let Ok(dir) = std::env::var("MIRAGE_SHADER_DIR") {
            config.shader_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("MIRAGE_VALIDATION") {
            config.validation = flag != "0";
        }

        config
    }

    /// Path of a compiled shader below the configured shader directory.
    pub fn shader_path(&self, name: &str) -> PathBuf {
        self.shader_dir.join(name)
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn test_shader_path_joins_dir() {
        let config = EngineConfig::default();
        let path = config.shader_path("mesh.vert.spv");
        assert!(path.ends_with("mesh.vert.spv"));
        assert!(path.starts_with(&config.shader_dir));
    }
}
