//! Renderer configuration
//!
//! Applications customize the render core through [`RendererConfig`] instead
//! of hardcoded values; the [`Config`] trait adds file round-tripping for
//! TOML and RON.

pub use serde::{Deserialize, Serialize};

/// Configuration trait for serializable settings types
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Configuration for the render core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Offscreen framebuffer resolution; per-frame render targets are sized
    /// to this once at startup and never implicitly resized
    pub framebuffer_width: u32,
    /// Offscreen framebuffer height
    pub framebuffer_height: u32,
    /// Shadow map resolution (square)
    pub shadow_map_resolution: u32,
    /// Whether to enable Vulkan validation layers (None = debug builds only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_validation: Option<bool>,
    /// Extra instance extensions beyond the surface set
    pub instance_extensions: Vec<String>,
    /// Extra instance layers beyond the validation layer
    pub instance_layers: Vec<String>,
    /// Background clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            framebuffer_width: 1280,
            framebuffer_height: 720,
            shadow_map_resolution: 2048,
            enable_validation: None,
            instance_extensions: Vec::new(),
            instance_layers: Vec::new(),
            clear_color: [0.005, 0.005, 0.005, 1.0],
        }
    }

    /// Set application version
    #[must_use]
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set the offscreen framebuffer resolution
    #[must_use]
    pub fn with_framebuffer_resolution(mut self, width: u32, height: u32) -> Self {
        self.framebuffer_width = width.max(1);
        self.framebuffer_height = height.max(1);
        self
    }

    /// Set the shadow map resolution
    #[must_use]
    pub fn with_shadow_map_resolution(mut self, resolution: u32) -> Self {
        self.shadow_map_resolution = resolution.clamp(256, 8192);
        self
    }

    /// Enable or disable Vulkan validation layers
    #[must_use]
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = Some(enable);
        self
    }

    /// Set background clear color [R, G, B, A] (0.0-1.0 range)
    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Whether validation should be enabled for this build
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl Default for RendererConfig {
    /// Default configuration for a generic viewer application
    fn default() -> Self {
        Self::new("Photon Application")
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = RendererConfig::default();
        assert!(config.framebuffer_width > 0);
        assert!(config.framebuffer_height > 0);
        assert!(config.shadow_map_resolution >= 256);
        assert!(config.instance_layers.is_empty());
    }

    #[test]
    fn builder_clamps_shadow_resolution() {
        let config = RendererConfig::default().with_shadow_map_resolution(64);
        assert_eq!(config.shadow_map_resolution, 256);

        let config = RendererConfig::default().with_shadow_map_resolution(1 << 20);
        assert_eq!(config.shadow_map_resolution, 8192);
    }

    #[test]
    fn toml_round_trip_preserves_settings() {
        let config = RendererConfig::new("RoundTrip")
            .with_framebuffer_resolution(640, 480)
            .with_validation(false);

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: RendererConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed.application_name, "RoundTrip");
        assert_eq!(parsed.framebuffer_width, 640);
        assert_eq!(parsed.framebuffer_height, 480);
        assert_eq!(parsed.enable_validation, Some(false));
    }
}
