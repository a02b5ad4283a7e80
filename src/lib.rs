// Core modules for per-voxel diffusion tensor analysis
pub mod geometry;
pub mod volume;
pub mod eigen;
pub mod correction;
pub mod metrics;
pub mod colormap;
pub mod operation;
pub mod config;
pub mod sampler;

// Re-export commonly used types
pub use geometry::{Tensor, Vector3D, RotationMatrix};
pub use volume::{Dims, TensorField, ScalarMask, MaskScalars, OutputField};
pub use eigen::{EigenAnalyzer, EigenMode, EigenTriple, InvalidTensorError};
pub use correction::{correct, Correction};
pub use metrics::{MetricComputer, VoxelValue};
pub use operation::{Operation, Plan, TensorOp, EigenOp, ColorOp, Axis, EigenvectorRank};
pub use config::TensorMathConfig;
pub use sampler::{FieldSampler, PassControl, PassOutput, PassReport};

/// Main result type for tensor mathematics
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tensor mathematics.
///
/// Every variant except `Cancelled` is raised before the first voxel is
/// touched, so a failed pass never leaves a half-written output behind.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No input tensor data to process")]
    EmptyField,

    #[error("Mask scalar type must be short (i16), got {0}")]
    MaskScalarType(&'static str),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch { expected: Dims, actual: Dims },

    #[error("Buffer length mismatch: expected {expected} values, got {actual}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Operation {operation:?} writes {expected} output, but a {actual} field was supplied")]
    OutputKind {
        operation: Operation,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Pass cancelled after {completed} of {total} slices")]
    Cancelled { completed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}
