//! Render core error types

use crate::config::ConfigError;
use crate::render::buffer::{BufferClass, BufferKind};

/// Errors raised while constructing the render system and its caches
///
/// The frame path itself never fails: misuse there is logged and ignored.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The render configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A buffer class is larger than a handle can address
    #[error("{class:?} {kind:?} buffer needs {bytes} bytes, handles address at most {limit}")]
    CapacityOutOfRange {
        /// Offending class
        class: BufferClass,
        /// Vertex or index buffer
        kind: BufferKind,
        /// Requested byte size
        bytes: u64,
        /// Largest addressable byte size
        limit: u32,
    },
}

/// Result type for render core construction
pub type RenderResult<T> = Result<T, RenderError>;
