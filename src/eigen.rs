// Eigen-analysis of symmetric 3x3 diffusion tensors
//
// Two strategies, selected explicitly by configuration:
// - Full: true symmetric eigen-decomposition, eigenpairs sorted descending
// - ColumnsAsApprox: tensor columns are taken as eigenvectors scaled by their
//   eigenvalues (for inputs that already carry principal directions)

use crate::geometry::{self, Tensor, Vector3D};
use nalgebra::{Matrix3, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Iteration cap for the symmetric QR sweep. 3x3 systems converge in a
/// handful of iterations; the cap only matters for non-finite input.
const MAX_EIGEN_ITERATIONS: usize = 256;

/// How eigenvalues and eigenvectors are obtained from a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EigenMode {
    /// Symmetric eigen-decomposition, sorted w0 >= w1 >= w2
    #[default]
    Full,

    /// Column i normalized is eigenvector i, its norm is eigenvalue i (unsorted)
    ColumnsAsApprox,
}

/// Eigenvalues and unit eigenvectors of one voxel's tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenTriple {
    /// Eigenvalues, descending for `EigenMode::Full`
    pub values: [f64; 3],

    /// Column i is the eigenvector belonging to `values[i]`
    pub vectors: Matrix3<f64>,
}

impl EigenTriple {
    /// Triple whose values and vectors are all NaN
    pub fn non_finite() -> Self {
        Self {
            values: [f64::NAN; 3],
            vectors: Matrix3::from_element(f64::NAN),
        }
    }

    /// Principal (largest eigenvalue) direction
    pub fn principal(&self) -> Vector3D {
        self.eigenvector(0)
    }

    pub fn eigenvector(&self, i: usize) -> Vector3D {
        self.vectors.column(i).into_owned()
    }

    /// Sum of eigenvalues
    pub fn trace(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn is_descending(&self) -> bool {
        self.values[0] >= self.values[1] && self.values[1] >= self.values[2]
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite()) && self.vectors.iter().all(|v| v.is_finite())
    }
}

/// Raised once per voxel when tensor validation is enabled and the tensor
/// holds NaN or infinite entries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tensor at voxel {index} ({}, {}, {})", .position[0], .position[1], .position[2])]
pub struct InvalidTensorError {
    pub index: usize,
    pub position: [usize; 3],
}

/// Eigen-analyzer configured with one extraction strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct EigenAnalyzer {
    mode: EigenMode,
}

impl EigenAnalyzer {
    pub fn new(mode: EigenMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> EigenMode {
        self.mode
    }

    /// Eigenvalues and eigenvectors of `tensor` according to the configured mode
    pub fn analyze(&self, tensor: &Tensor) -> EigenTriple {
        match self.mode {
            EigenMode::Full => decompose(tensor),
            EigenMode::ColumnsAsApprox => columns_as_eigenvectors(tensor),
        }
    }
}

/// Full symmetric eigen-decomposition with eigenpairs sorted descending.
///
/// Only the lower triangle is read, so the tensor is assumed symmetric.
/// Non-finite input or a sweep that fails to converge yields a NaN triple.
pub fn decompose(tensor: &Tensor) -> EigenTriple {
    if !geometry::is_finite(tensor) {
        return EigenTriple::non_finite();
    }

    let eigen = match SymmetricEigen::try_new(*tensor, f64::EPSILON, MAX_EIGEN_ITERATIONS) {
        Some(eigen) => eigen,
        None => {
            log::debug!("Symmetric eigen-decomposition did not converge: {:?}", tensor);
            return EigenTriple::non_finite();
        }
    };

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let values = order.map(|i| eigen.eigenvalues[i]);
    let columns = order.map(|i| eigen.eigenvectors.column(i).into_owned());

    EigenTriple {
        values,
        vectors: Matrix3::from_columns(&columns),
    }
}

/// Treat each tensor column as an eigenvector scaled by its eigenvalue.
///
/// This is an approximation, not a decomposition: values keep column order
/// and zero columns stay zero vectors with eigenvalue 0.
pub fn columns_as_eigenvectors(tensor: &Tensor) -> EigenTriple {
    let mut values = [0.0; 3];
    let mut vectors = Matrix3::zeros();

    for i in 0..3 {
        let column: Vector3D = tensor.column(i).into_owned();
        let norm = column.norm();
        values[i] = norm;
        if norm > 0.0 {
            vectors.set_column(i, &(column / norm));
        } else {
            vectors.set_column(i, &column);
        }
    }

    EigenTriple { values, vectors }
}
