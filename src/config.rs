// Configuration for a tensor math pass

use crate::eigen::EigenMode;
use crate::geometry::RotationMatrix;
use crate::operation::Operation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one pass over a tensor field.
///
/// Missing JSON keys fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorMathConfig {
    /// Quantity computed per voxel
    pub operation: Operation,

    /// Multiplier for scalar outputs; for color outputs 1000 maps unit
    /// intensity to the full byte range
    pub scale_factor: f64,

    /// True: full eigen-decomposition. False: tensor columns are used as
    /// approximate eigenvectors
    pub extract_eigenvalues: bool,

    /// Remove negative eigenvalues before computing eigen metrics
    pub fix_negative_eigenvalues: bool,

    /// Only voxels whose mask label equals `mask_label_value` are computed
    pub mask_with_scalars: bool,

    pub mask_label_value: i16,

    /// Row-major rotation applied to eigenvectors before orientation coloring
    pub tensor_rotation_matrix: Option<[[f64; 3]; 3]>,

    /// Report every voxel whose tensor has non-finite entries
    pub validate_tensors: bool,

    /// Process z-slices in parallel
    pub parallel: bool,
}

impl Default for TensorMathConfig {
    fn default() -> Self {
        Self {
            operation: Operation::Trace,
            scale_factor: 1.0,
            extract_eigenvalues: true,
            fix_negative_eigenvalues: true,
            mask_with_scalars: false,
            mask_label_value: 1,
            tensor_rotation_matrix: None,
            validate_tensors: false,
            parallel: true,
        }
    }
}

impl TensorMathConfig {
    /// Default configuration for `operation`
    pub fn for_operation(operation: Operation) -> Self {
        Self {
            operation,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loading tensor math config from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would poison every voxel of a pass
    pub fn validate(&self) -> Result<()> {
        if !self.scale_factor.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "scale_factor must be finite, got {}",
                self.scale_factor
            )));
        }

        if let Some(rows) = &self.tensor_rotation_matrix {
            if rows.iter().flatten().any(|v| !v.is_finite()) {
                return Err(Error::InvalidConfig(
                    "tensor_rotation_matrix has non-finite entries".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn eigen_mode(&self) -> EigenMode {
        if self.extract_eigenvalues {
            EigenMode::Full
        } else {
            EigenMode::ColumnsAsApprox
        }
    }

    /// Rotation as a matrix, None when unset
    pub fn rotation(&self) -> Option<RotationMatrix> {
        self.tensor_rotation_matrix
            .map(|rows| RotationMatrix::from_fn(|r, c| rows[r][c]))
    }

    pub fn set_rotation(&mut self, rotation: &RotationMatrix) {
        self.tensor_rotation_matrix = Some(std::array::from_fn(|r| {
            std::array::from_fn(|c| rotation[(r, c)])
        }));
    }
}
