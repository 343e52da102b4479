//! # Configuration System
//!
//! Serializable configuration for the render core. Every configuration type
//! implements [`Config`], which loads and saves TOML or RON files depending on
//! the file extension.
//!
//! ## Configuration Categories
//!
//! - **Render Config**: default shader, initial screen resolution
//! - **Vertex-Buffer Cache**: lifetime of idle whole-buffer entries, pool growth
//! - **Buffer Cache**: per-class vertex/index capacities

use std::path::Path;

pub use serde::{Serialize, Deserialize};

use crate::render::buffer::{BufferClass, MAX_FIELD_VALUE, INDEX_STRIDE};

/// On-disk formats, picked by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format of `path`, if its extension names a supported one
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Serializable settings stored as TOML or RON
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Read and parse `path`
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let text = std::fs::read_to_string(path)?;

        let parsed = match format {
            ConfigFormat::Toml => toml::from_str(&text).map_err(|e| e.to_string()),
            ConfigFormat::Ron => ron::from_str(&text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| ConfigError::Parse { path: path.display().to_string(), reason })
    }

    /// Serialize into `path`, replacing its contents
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Failures while loading, saving or validating a configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("config file access failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file contents do not describe this configuration
    #[error("cannot parse {path}: {reason}")]
    Parse {
        /// Offending file
        path: String,
        /// Parser message
        reason: String,
    },

    /// The configuration could not be serialized
    #[error("cannot serialize config: {0}")]
    Serialize(String),

    /// The extension is neither `.toml` nor `.ron`
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside the range the render core can represent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Vertex and index capacity of one buffer class, in elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferClassConfig {
    /// Maximum number of vertices the class's vertex buffer can hold
    pub max_vertices: u32,
    /// Maximum number of indices the class's index buffer can hold
    pub max_indices: u32,
}

impl BufferClassConfig {
    /// Create a class capacity
    pub const fn new(max_vertices: u32, max_indices: u32) -> Self {
        Self { max_vertices, max_indices }
    }

    /// Byte size of the vertex buffer for `class`
    pub fn vertex_bytes(&self, class: BufferClass) -> u64 {
        u64::from(self.max_vertices) * class.vertex_stride() as u64
    }

    /// Byte size of the index buffer
    pub fn index_bytes(&self) -> u64 {
        u64::from(self.max_indices) * INDEX_STRIDE as u64
    }
}

/// Capacities for every fixed buffer class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferCacheConfig {
    /// Static geometry uploaded once and kept until re-upload
    pub static_geometry: BufferClassConfig,
    /// Geometry rebuilt by gameplay code
    pub dynamic_geometry: BufferClassConfig,
    /// Particle emitter quads
    pub particles: BufferClassConfig,
    /// UI quads, rebuilt every frame
    pub ui: BufferClassConfig,
    /// Debug triangle primitives
    pub debug_triangles: BufferClassConfig,
    /// Debug line primitives
    pub debug_lines: BufferClassConfig,
    /// Reserved for applications
    pub custom1: BufferClassConfig,
    /// Reserved for applications
    pub custom2: BufferClassConfig,
}

impl BufferCacheConfig {
    /// Capacity configured for `class`
    pub fn get(&self, class: BufferClass) -> BufferClassConfig {
        match class {
            BufferClass::StaticGeometry => self.static_geometry,
            BufferClass::DynamicGeometry => self.dynamic_geometry,
            BufferClass::Particles => self.particles,
            BufferClass::Ui => self.ui,
            BufferClass::DebugTriangles => self.debug_triangles,
            BufferClass::DebugLines => self.debug_lines,
            BufferClass::Custom1 => self.custom1,
            BufferClass::Custom2 => self.custom2,
        }
    }

    /// Override the capacity of `class`
    pub fn set(&mut self, class: BufferClass, capacity: BufferClassConfig) {
        let slot = match class {
            BufferClass::StaticGeometry => &mut self.static_geometry,
            BufferClass::DynamicGeometry => &mut self.dynamic_geometry,
            BufferClass::Particles => &mut self.particles,
            BufferClass::Ui => &mut self.ui,
            BufferClass::DebugTriangles => &mut self.debug_triangles,
            BufferClass::DebugLines => &mut self.debug_lines,
            BufferClass::Custom1 => &mut self.custom1,
            BufferClass::Custom2 => &mut self.custom2,
        };
        *slot = capacity;
    }

    /// Reject capacities whose byte size cannot be encoded in a buffer handle
    pub fn validate(&self) -> Result<(), ConfigError> {
        for class in BufferClass::ALL {
            let capacity = self.get(class);
            let vertex_bytes = capacity.vertex_bytes(class);
            let index_bytes = capacity.index_bytes();

            if vertex_bytes > u64::from(MAX_FIELD_VALUE) {
                return Err(ConfigError::Invalid(format!(
                    "{class:?} vertex buffer needs {vertex_bytes} bytes, limit is {MAX_FIELD_VALUE}"
                )));
            }
            if index_bytes > u64::from(MAX_FIELD_VALUE) {
                return Err(ConfigError::Invalid(format!(
                    "{class:?} index buffer needs {index_bytes} bytes, limit is {MAX_FIELD_VALUE}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for BufferCacheConfig {
    fn default() -> Self {
        Self {
            static_geometry: BufferClassConfig::new(65_536, 196_608),
            dynamic_geometry: BufferClassConfig::new(65_536, 196_608),
            particles: BufferClassConfig::new(16_384, 24_576),
            ui: BufferClassConfig::new(16_384, 24_576),
            debug_triangles: BufferClassConfig::new(8_192, 12_288),
            debug_lines: BufferClassConfig::new(16_384, 16_384),
            custom1: BufferClassConfig::new(4_096, 6_144),
            custom2: BufferClassConfig::new(4_096, 6_144),
        }
    }
}

/// Settings for the whole-buffer (legacy) vertex-buffer cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexBufferCacheConfig {
    /// Frames an entry survives without a refresh before it can be reclaimed
    pub lifetime_frames: u64,
    /// Number of GPU buffer names generated whenever the free pool runs dry
    pub grow_batch: usize,
}

impl Default for VertexBufferCacheConfig {
    fn default() -> Self {
        Self {
            lifetime_frames: 2,
            grow_batch: 32,
        }
    }
}

/// # Render Configuration
///
/// Top-level configuration consumed by [`RenderSystem`](crate::render::RenderSystem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Name of the shader used for meshes that define none
    pub default_shader: String,
    /// Screen resolution assumed until the platform reports one
    pub screen_resolution: (u32, u32),
    /// Whole-buffer cache settings
    pub vertex_buffers: VertexBufferCacheConfig,
    /// Sub-allocated buffer class capacities
    pub buffers: BufferCacheConfig,
}

impl RenderConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            default_shader: "default".to_string(),
            screen_resolution: (1280, 720),
            vertex_buffers: VertexBufferCacheConfig::default(),
            buffers: BufferCacheConfig::default(),
        }
    }

    /// Set the default shader name
    pub fn with_default_shader(mut self, name: impl Into<String>) -> Self {
        self.default_shader = name.into();
        self
    }

    /// Set the legacy buffer lifetime in frames
    pub fn with_buffer_lifetime(mut self, frames: u64) -> Self {
        self.vertex_buffers.lifetime_frames = frames;
        self
    }

    /// Override the capacity of one buffer class
    pub fn with_buffer_class(mut self, class: BufferClass, capacity: BufferClassConfig) -> Self {
        self.buffers.set(class, capacity);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_shader.is_empty() {
            return Err(ConfigError::Invalid("default shader name cannot be empty".to_string()));
        }

        if self.vertex_buffers.lifetime_frames == 0 {
            return Err(ConfigError::Invalid("vertex buffer lifetime must be at least 1 frame".to_string()));
        }

        if self.vertex_buffers.grow_batch == 0 {
            return Err(ConfigError::Invalid("vertex buffer grow batch must be at least 1".to_string()));
        }

        self.buffers.validate()
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RenderConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_lifetime_is_rejected() {
        let config = RenderConfig::default().with_buffer_lifetime(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_capacity_beyond_handle_range_is_rejected() {
        let config = RenderConfig::default()
            .with_buffer_class(BufferClass::StaticGeometry, BufferClassConfig::new(1_000_000, 16));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip_keeps_overrides() {
        let config = RenderConfig::default()
            .with_default_shader("unlit")
            .with_buffer_class(BufferClass::Ui, BufferClassConfig::new(128, 256));

        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed: RenderConfig = toml::from_str(&text).expect("parse");

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_ron_falls_back_to_defaults() {
        let parsed: RenderConfig = ron::from_str("(default_shader: \"lit\")").expect("parse");

        assert_eq!(parsed.default_shader, "lit");
        assert_eq!(parsed.vertex_buffers.lifetime_frames, 2);
        assert_eq!(parsed.buffers, BufferCacheConfig::default());
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = RenderConfig::load_from_file("render.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
        assert!(ConfigFormat::from_path(Path::new("render")).is_err());
        assert_eq!(ConfigFormat::from_path(Path::new("a/render.ron")).ok(), Some(ConfigFormat::Ron));
    }

    #[test]
    fn test_ron_file_save_and_load() {
        let path = std::env::temp_dir().join("render_core_config_save.ron");
        let config = RenderConfig::default().with_default_shader("sprite");

        config.save_to_file(&path).expect("save");
        let loaded = RenderConfig::load_from_file(&path);
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.expect("load"), config);
    }

    #[test]
    fn test_malformed_toml_names_the_file() {
        let path = std::env::temp_dir().join("render_core_config_broken.toml");
        std::fs::write(&path, "default_shader = ").expect("write temp config");

        let err = RenderConfig::load_from_file(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);

        assert!(matches!(&err, ConfigError::Parse { path: file, .. } if file.ends_with("render_core_config_broken.toml")));
    }
}
