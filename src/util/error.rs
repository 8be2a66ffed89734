//! Error types for scene packing.

use thiserror::Error;

use crate::gpu::PhysicalBuffer;

/// Main error type for scene building and buffer layout.
#[derive(Error, Debug)]
pub enum Error {
    /// Mesh is malformed (bad triangle list, no positions). The mesh is skipped,
    /// the rest of the model is still packed.
    #[error("Missing geometry in mesh '{mesh}': {reason}")]
    MissingGeometry { mesh: String, reason: String },

    /// Material descriptor failed ingestion checks
    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    /// Lookup into one of the scene arenas past its end
    #[error("Index {index} out of range (len: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Transform has no inverse; the previous matrices were kept
    #[error("Degenerate transform for placement {placement}: matrix is not invertible")]
    DegenerateTransform { placement: u64 },

    /// Packed arrays do not fit the physical buffer; grow it and lay out again
    #[error("Buffer {buffer} needs {required} bytes but has capacity {capacity}")]
    BufferCapacityExceeded {
        buffer: PhysicalBuffer,
        required: u64,
        capacity: u64,
    },

    /// Growth would pass the device limit
    #[error("Scene too large: buffer {buffer} needs {required} bytes, device limit is {limit}")]
    SceneTooLarge {
        buffer: PhysicalBuffer,
        required: u64,
        limit: u64,
    },

    /// Placement id is not (or no longer) part of the scene
    #[error("Unknown placement: {0}")]
    UnknownPlacement(u64),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a missing geometry error.
    pub fn missing_geometry(mesh: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingGeometry {
            mesh: mesh.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can recover by growing buffers or rejecting one update.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingGeometry { .. }
                | Self::InvalidMaterial(_)
                | Self::DegenerateTransform { .. }
                | Self::BufferCapacityExceeded { .. }
        )
    }
}

/// Result type alias for scene operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::IndexOutOfRange { index: 5, len: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));

        let e = Error::BufferCapacityExceeded {
            buffer: PhysicalBuffer::TriangleMaterial,
            required: 4096,
            capacity: 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("triangle_material"));
        assert!(msg.contains("4096"));
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::DegenerateTransform { placement: 1 }.is_recoverable());
        assert!(!Error::IndexOutOfRange { index: 1, len: 0 }.is_recoverable());
        assert!(!Error::SceneTooLarge {
            buffer: PhysicalBuffer::Blas,
            required: 10,
            limit: 5
        }
        .is_recoverable());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
