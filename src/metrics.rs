// Per-voxel tensor metrics
//
// Pure formulas over either the raw tensor or a (corrected) eigen triple.
// Every division is guarded by EPSILON so degenerate tensors degrade to
// finite values instead of NaN: anisotropy and mode denominators always get
// EPSILON added, the shape measures only when w0 falls below it.

use crate::colormap;
use crate::eigen::EigenTriple;
use crate::geometry::{RotationMatrix, Tensor};
use crate::operation::{ColorOp, EigenOp, Plan, TensorOp};
use std::f64::consts::{FRAC_1_SQRT_2, SQRT_2};

/// Guard for denominators that may vanish
pub const EPSILON: f64 = 1e-14;

/// A scale factor of this value maps unit color intensity to the full byte range
pub const COLOR_SCALE_REFERENCE: f64 = 1000.0;

/// Value computed for one voxel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoxelValue {
    Scalar(f64),
    Color([u8; 4]),
}

/// Denominator with a small positive offset when it falls below EPSILON
fn guarded_below(denominator: f64) -> f64 {
    if denominator < EPSILON {
        denominator + EPSILON
    } else {
        denominator
    }
}

// ----------------------------------------------------------------------------
// Tensor-only metrics
// ----------------------------------------------------------------------------

pub fn trace(tensor: &Tensor) -> f64 {
    tensor[(0, 0)] + tensor[(1, 1)] + tensor[(2, 2)]
}

pub fn determinant(tensor: &Tensor) -> f64 {
    tensor.determinant()
}

// ----------------------------------------------------------------------------
// Eigenvalue metrics
// ----------------------------------------------------------------------------

/// sqrt(1/2) * sqrt((w0-w1)^2 + (w2-w1)^2 + (w2-w0)^2)
fn anisotropy_numerator(w: [f64; 3]) -> f64 {
    let d01 = w[0] - w[1];
    let d21 = w[2] - w[1];
    let d20 = w[2] - w[0];
    FRAC_1_SQRT_2 * (d01 * d01 + d21 * d21 + d20 * d20).sqrt()
}

pub fn relative_anisotropy(w: [f64; 3]) -> f64 {
    anisotropy_numerator(w) / (w[0] + w[1] + w[2] + EPSILON)
}

pub fn fractional_anisotropy(w: [f64; 3]) -> f64 {
    let norm = (w[0] * w[0] + w[1] * w[1] + w[2] * w[2]).sqrt();
    anisotropy_numerator(w) / (norm + EPSILON)
}

pub fn linear_measure(w: [f64; 3]) -> f64 {
    (w[0] - w[1]) / guarded_below(w[0])
}

pub fn planar_measure(w: [f64; 3]) -> f64 {
    (w[1] - w[2]) / guarded_below(w[0])
}

pub fn spherical_measure(w: [f64; 3]) -> f64 {
    w[2] / guarded_below(w[0])
}

pub fn parallel_diffusivity(w: [f64; 3]) -> f64 {
    w[0]
}

pub fn perpendicular_diffusivity(w: [f64; 3]) -> f64 {
    (w[1] + w[2]) / 2.0
}

pub fn mean_diffusivity(w: [f64; 3]) -> f64 {
    (w[0] + w[1] + w[2]) / 3.0
}

/// Tensor mode (Kindlmann): skewness of the eigenvalues, -1 planar .. +1 linear
pub fn mode(w: [f64; 3]) -> f64 {
    let mean = (w[0] + w[1] + w[2]) / 3.0;
    let variance = ((w[0] - mean).powi(2) + (w[1] - mean).powi(2) + (w[2] - mean).powi(2)) / 3.0;
    let sigma_cubed = variance.sqrt().powi(3);

    SQRT_2
        * ((w[0] + w[1] - 2.0 * w[2]) * (2.0 * w[0] - w[1] - w[2]) * (w[0] - 2.0 * w[1] + w[2]))
        / (27.0 * (sigma_cubed + EPSILON))
}

/// Evaluates operations for one configured pass
#[derive(Debug, Clone, Copy)]
pub struct MetricComputer {
    rgb_scale: f64,
    rotation: Option<RotationMatrix>,
}

impl Default for MetricComputer {
    fn default() -> Self {
        Self::new(1.0, None)
    }
}

impl MetricComputer {
    /// `scale_factor` drives color intensity; `rotation` re-orients
    /// eigenvectors before orientation coloring
    pub fn new(scale_factor: f64, rotation: Option<RotationMatrix>) -> Self {
        Self {
            rgb_scale: u8::MAX as f64 * scale_factor / COLOR_SCALE_REFERENCE,
            rotation,
        }
    }

    pub fn tensor_scalar(&self, op: TensorOp, tensor: &Tensor) -> f64 {
        match op {
            TensorOp::D11 => tensor[(0, 0)],
            TensorOp::D22 => tensor[(1, 1)],
            TensorOp::D33 => tensor[(2, 2)],
            TensorOp::Trace => trace(tensor),
            TensorOp::Determinant => determinant(tensor),
        }
    }

    pub fn eigen_scalar(&self, op: EigenOp, eigen: &EigenTriple) -> f64 {
        let w = eigen.values;
        let principal = || eigen.principal();

        match op {
            EigenOp::RelativeAnisotropy => relative_anisotropy(w),
            EigenOp::FractionalAnisotropy => fractional_anisotropy(w),
            EigenOp::LinearMeasure => linear_measure(w),
            EigenOp::PlanarMeasure => planar_measure(w),
            EigenOp::SphericalMeasure => spherical_measure(w),
            EigenOp::MaxEigenvalue => w[0],
            EigenOp::MidEigenvalue => w[1],
            EigenOp::MinEigenvalue => w[2],
            EigenOp::ParallelDiffusivity => parallel_diffusivity(w),
            EigenOp::PerpendicularDiffusivity => perpendicular_diffusivity(w),
            EigenOp::MeanDiffusivity => mean_diffusivity(w),
            EigenOp::MaxEigenvalueProjection(axis) => w[0] * principal()[axis.index()].abs(),
            EigenOp::RaiMaxEigenvec(axis) => principal()[axis.index()].abs() * relative_anisotropy(w),
            EigenOp::MaxEigenvec(axis) => principal()[axis.index()].abs(),
            EigenOp::Mode => mode(w),
        }
    }

    pub fn color(&self, op: ColorOp, eigen: &EigenTriple) -> [u8; 4] {
        let w = eigen.values;

        match op {
            ColorOp::ByMode => {
                colormap::mode_color(mode(w), fractional_anisotropy(w), self.rgb_scale)
            }
            ColorOp::ByOrientation(rank) => {
                let mut direction = eigen.eigenvector(rank.index());
                if let Some(rotation) = &self.rotation {
                    direction = rotation * direction;
                }
                colormap::orientation_color(&direction, linear_measure(w), self.rgb_scale)
            }
        }
    }

    /// Evaluate a plan. Tensor plans ignore `eigen`; eigen and color plans
    /// require it and return NaN / black when it is missing.
    pub fn evaluate(&self, plan: Plan, tensor: &Tensor, eigen: Option<&EigenTriple>) -> VoxelValue {
        match (plan, eigen) {
            (Plan::Tensor(op), _) => VoxelValue::Scalar(self.tensor_scalar(op, tensor)),
            (Plan::Eigen(op), Some(eigen)) => VoxelValue::Scalar(self.eigen_scalar(op, eigen)),
            (Plan::Color(op), Some(eigen)) => VoxelValue::Color(self.color(op, eigen)),
            (Plan::Eigen(_), None) => VoxelValue::Scalar(f64::NAN),
            (Plan::Color(_), None) => VoxelValue::Color([0, 0, 0, colormap::OPAQUE]),
        }
    }
}
