use nalgebra::{Matrix3, Vector3};

/// Symmetric 3x3 diffusion tensor
pub type Tensor = Matrix3<f64>;

/// 3D vector type
pub type Vector3D = Vector3<f64>;

/// Rotation applied to eigenvectors before orientation coloring
pub type RotationMatrix = Matrix3<f64>;

/// Build a tensor from 9 row-major components.
/// Returns None if fewer than 9 values are supplied.
pub fn tensor_from_row_major(components: &[f64]) -> Option<Tensor> {
    if components.len() < 9 {
        return None;
    }
    Some(Tensor::from_row_slice(&components[..9]))
}

/// Diagonal tensor with the given principal diffusivities along x, y, z
pub fn diagonal_tensor(dxx: f64, dyy: f64, dzz: f64) -> Tensor {
    Tensor::from_diagonal(&Vector3D::new(dxx, dyy, dzz))
}

/// Tensor with eigenvalues `values` along the orthonormal columns of `frame`.
/// Computes frame * diag(values) * frame^T.
pub fn tensor_from_eigensystem(values: [f64; 3], frame: &Matrix3<f64>) -> Tensor {
    let diag = Tensor::from_diagonal(&Vector3D::new(values[0], values[1], values[2]));
    frame * diag * frame.transpose()
}

/// True when every entry is finite
pub fn is_finite(tensor: &Tensor) -> bool {
    tensor.iter().all(|v| v.is_finite())
}

/// Largest absolute difference between a tensor and its transpose
pub fn asymmetry(tensor: &Tensor) -> f64 {
    (tensor - tensor.transpose()).amax()
}
