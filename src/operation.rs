// Operation selector
//
// `Operation` is the flat, configurable list. `Operation::plan` maps it onto
// a tagged union that fixes which operations skip eigen-analysis (tensor
// operations) and which need it (eigen and color operations).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Derived quantity computed per voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operation {
    D11,
    D22,
    D33,
    #[default]
    Trace,
    Determinant,
    RelativeAnisotropy,
    FractionalAnisotropy,
    LinearMeasure,
    PlanarMeasure,
    SphericalMeasure,
    MaxEigenvalue,
    MidEigenvalue,
    MinEigenvalue,
    ParallelDiffusivity,
    PerpendicularDiffusivity,
    MeanDiffusivity,
    MaxEigenvalueProjectionX,
    MaxEigenvalueProjectionY,
    MaxEigenvalueProjectionZ,
    RaiMaxEigenvecX,
    RaiMaxEigenvecY,
    RaiMaxEigenvecZ,
    MaxEigenvecX,
    MaxEigenvecY,
    MaxEigenvecZ,
    Mode,
    ColorByMode,
    ColorByOrientation,
    ColorByMidEigenvector,
    ColorByMinEigenvector,
}

/// Cartesian component of an eigenvector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Which eigenvector (by eigenvalue rank) an orientation color uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EigenvectorRank {
    Major,
    Middle,
    Minor,
}

impl EigenvectorRank {
    pub fn index(self) -> usize {
        match self {
            EigenvectorRank::Major => 0,
            EigenvectorRank::Middle => 1,
            EigenvectorRank::Minor => 2,
        }
    }
}

/// Operations computed directly from the raw tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorOp {
    D11,
    D22,
    D33,
    Trace,
    Determinant,
}

/// Scalar operations that need the (corrected) eigensystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EigenOp {
    RelativeAnisotropy,
    FractionalAnisotropy,
    LinearMeasure,
    PlanarMeasure,
    SphericalMeasure,
    MaxEigenvalue,
    MidEigenvalue,
    MinEigenvalue,
    ParallelDiffusivity,
    PerpendicularDiffusivity,
    MeanDiffusivity,
    MaxEigenvalueProjection(Axis),
    RaiMaxEigenvec(Axis),
    MaxEigenvec(Axis),
    Mode,
}

/// RGBA operations that need the eigensystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorOp {
    ByMode,
    ByOrientation(EigenvectorRank),
}

/// How a voxel is evaluated for a given operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plan {
    Tensor(TensorOp),
    Eigen(EigenOp),
    Color(ColorOp),
}

impl Operation {
    /// Every operation, in declaration order. The position in this list is
    /// the operation's numeric code.
    pub const ALL: [Operation; 30] = [
        Operation::D11,
        Operation::D22,
        Operation::D33,
        Operation::Trace,
        Operation::Determinant,
        Operation::RelativeAnisotropy,
        Operation::FractionalAnisotropy,
        Operation::LinearMeasure,
        Operation::PlanarMeasure,
        Operation::SphericalMeasure,
        Operation::MaxEigenvalue,
        Operation::MidEigenvalue,
        Operation::MinEigenvalue,
        Operation::ParallelDiffusivity,
        Operation::PerpendicularDiffusivity,
        Operation::MeanDiffusivity,
        Operation::MaxEigenvalueProjectionX,
        Operation::MaxEigenvalueProjectionY,
        Operation::MaxEigenvalueProjectionZ,
        Operation::RaiMaxEigenvecX,
        Operation::RaiMaxEigenvecY,
        Operation::RaiMaxEigenvecZ,
        Operation::MaxEigenvecX,
        Operation::MaxEigenvecY,
        Operation::MaxEigenvecZ,
        Operation::Mode,
        Operation::ColorByMode,
        Operation::ColorByOrientation,
        Operation::ColorByMidEigenvector,
        Operation::ColorByMinEigenvector,
    ];

    pub fn plan(self) -> Plan {
        use Operation as Op;
        match self {
            Op::D11 => Plan::Tensor(TensorOp::D11),
            Op::D22 => Plan::Tensor(TensorOp::D22),
            Op::D33 => Plan::Tensor(TensorOp::D33),
            Op::Trace => Plan::Tensor(TensorOp::Trace),
            Op::Determinant => Plan::Tensor(TensorOp::Determinant),

            Op::RelativeAnisotropy => Plan::Eigen(EigenOp::RelativeAnisotropy),
            Op::FractionalAnisotropy => Plan::Eigen(EigenOp::FractionalAnisotropy),
            Op::LinearMeasure => Plan::Eigen(EigenOp::LinearMeasure),
            Op::PlanarMeasure => Plan::Eigen(EigenOp::PlanarMeasure),
            Op::SphericalMeasure => Plan::Eigen(EigenOp::SphericalMeasure),
            Op::MaxEigenvalue => Plan::Eigen(EigenOp::MaxEigenvalue),
            Op::MidEigenvalue => Plan::Eigen(EigenOp::MidEigenvalue),
            Op::MinEigenvalue => Plan::Eigen(EigenOp::MinEigenvalue),
            Op::ParallelDiffusivity => Plan::Eigen(EigenOp::ParallelDiffusivity),
            Op::PerpendicularDiffusivity => Plan::Eigen(EigenOp::PerpendicularDiffusivity),
            Op::MeanDiffusivity => Plan::Eigen(EigenOp::MeanDiffusivity),
            Op::MaxEigenvalueProjectionX => Plan::Eigen(EigenOp::MaxEigenvalueProjection(Axis::X)),
            Op::MaxEigenvalueProjectionY => Plan::Eigen(EigenOp::MaxEigenvalueProjection(Axis::Y)),
            Op::MaxEigenvalueProjectionZ => Plan::Eigen(EigenOp::MaxEigenvalueProjection(Axis::Z)),
            Op::RaiMaxEigenvecX => Plan::Eigen(EigenOp::RaiMaxEigenvec(Axis::X)),
            Op::RaiMaxEigenvecY => Plan::Eigen(EigenOp::RaiMaxEigenvec(Axis::Y)),
            Op::RaiMaxEigenvecZ => Plan::Eigen(EigenOp::RaiMaxEigenvec(Axis::Z)),
            Op::MaxEigenvecX => Plan::Eigen(EigenOp::MaxEigenvec(Axis::X)),
            Op::MaxEigenvecY => Plan::Eigen(EigenOp::MaxEigenvec(Axis::Y)),
            Op::MaxEigenvecZ => Plan::Eigen(EigenOp::MaxEigenvec(Axis::Z)),
            Op::Mode => Plan::Eigen(EigenOp::Mode),

            Op::ColorByMode => Plan::Color(ColorOp::ByMode),
            Op::ColorByOrientation => Plan::Color(ColorOp::ByOrientation(EigenvectorRank::Major)),
            Op::ColorByMidEigenvector => Plan::Color(ColorOp::ByOrientation(EigenvectorRank::Middle)),
            Op::ColorByMinEigenvector => Plan::Color(ColorOp::ByOrientation(EigenvectorRank::Minor)),
        }
    }

    /// False only for D11, D22, D33, Trace and Determinant
    pub fn requires_eigensystem(self) -> bool {
        !matches!(self.plan(), Plan::Tensor(_))
    }

    /// Color operations write RGBA bytes and ignore output scaling
    pub fn is_color(self) -> bool {
        matches!(self.plan(), Plan::Color(_))
    }

    /// Numeric code of this operation (its index in `ALL`)
    pub fn code(self) -> u8 {
        Self::ALL.iter().position(|&op| op == self).unwrap_or(0) as u8
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<u8> for Operation {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| Error::UnknownOperation(code.to_string()))
    }
}

impl FromStr for Operation {
    type Err = Error;

    /// Accepts variant names case-insensitively, with or without underscores
    /// ("FractionalAnisotropy", "fractional_anisotropy", "FRACTIONALANISOTROPY").
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        Self::ALL
            .iter()
            .copied()
            .find(|op| format!("{:?}", op).to_ascii_lowercase() == wanted)
            .ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_partition() {
        let tensor_ops: Vec<Operation> = Operation::ALL
            .iter()
            .copied()
            .filter(|op| !op.requires_eigensystem())
            .collect();

        assert_eq!(
            tensor_ops,
            vec![
                Operation::D11,
                Operation::D22,
                Operation::D33,
                Operation::Trace,
                Operation::Determinant,
            ]
        );
    }

    #[test]
    fn test_color_operations() {
        let colors: Vec<Operation> = Operation::ALL.iter().copied().filter(|op| op.is_color()).collect();
        assert_eq!(colors.len(), 4);
        assert!(Operation::ColorByMode.is_color());
        assert!(!Operation::Mode.is_color());
    }

    #[test]
    fn test_codes_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(Operation::try_from(op.code()).unwrap(), op);
        }
        assert!(matches!(Operation::try_from(200), Err(Error::UnknownOperation(_))));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("FractionalAnisotropy".parse::<Operation>().unwrap(), Operation::FractionalAnisotropy);
        assert_eq!("fractional_anisotropy".parse::<Operation>().unwrap(), Operation::FractionalAnisotropy);
        assert_eq!("d11".parse::<Operation>().unwrap(), Operation::D11);
        assert_eq!("color-by-mode".parse::<Operation>().unwrap(), Operation::ColorByMode);

        let err = "Fractional Anisotropy!".parse::<Operation>().unwrap_err();
        assert!(matches!(err, Error::UnknownOperation(name) if name == "Fractional Anisotropy!"));
    }

    #[test]
    fn test_serde_uses_variant_names() {
        let json = serde_json::to_string(&Operation::RaiMaxEigenvecY).unwrap();
        assert_eq!(json, "\"RaiMaxEigenvecY\"");

        let bad = serde_json::from_str::<Operation>("\"NotAnOperation\"");
        assert!(bad.is_err());
    }
}
