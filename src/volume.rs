// Voxel grids consumed and produced by a tensor mathematics pass
//
// All grids are stored row-major with x varying fastest:
//   index = x + y * nx + z * nx * ny

use crate::geometry::{self, Tensor};
use crate::operation::Operation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Grid dimensions in voxels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Dims {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of voxels in one z-slice
    pub fn slice_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Linear index of voxel (x, y, z)
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.nx + z * self.nx * self.ny
    }

    /// Voxel coordinates of a linear index
    pub fn position(&self, index: usize) -> [usize; 3] {
        let slice = self.slice_len().max(1);
        let nx = self.nx.max(1);
        let z = index / slice;
        let rem = index % slice;
        [rem % nx, rem / nx, z]
    }
}

/// Volumetric field of diffusion tensors, read-only during a pass
#[derive(Debug, Clone)]
pub struct TensorField {
    dims: Dims,
    tensors: Vec<Tensor>,
}

impl TensorField {
    /// Create a field from one tensor per voxel
    pub fn new(dims: Dims, tensors: Vec<Tensor>) -> Result<Self> {
        if tensors.len() != dims.len() {
            return Err(Error::BufferLength {
                expected: dims.len(),
                actual: tensors.len(),
            });
        }
        Ok(Self { dims, tensors })
    }

    /// Create a field from a flat buffer of 9 row-major components per voxel
    pub fn from_components(dims: Dims, components: &[f64]) -> Result<Self> {
        let expected = dims.len() * 9;
        if components.len() != expected {
            return Err(Error::BufferLength {
                expected,
                actual: components.len(),
            });
        }

        let tensors = components
            .chunks_exact(9)
            .filter_map(geometry::tensor_from_row_major)
            .collect();

        Ok(Self { dims, tensors })
    }

    /// Create a field by evaluating `f(x, y, z)` at every voxel
    pub fn from_fn<F>(dims: Dims, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> Tensor,
    {
        let mut tensors = Vec::with_capacity(dims.len());
        for z in 0..dims.nz {
            for y in 0..dims.ny {
                for x in 0..dims.nx {
                    tensors.push(f(x, y, z));
                }
            }
        }
        Self { dims, tensors }
    }

    /// Field with the same tensor at every voxel
    pub fn uniform(dims: Dims, tensor: Tensor) -> Self {
        Self {
            dims,
            tensors: vec![tensor; dims.len()],
        }
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&Tensor> {
        if x >= self.dims.nx || y >= self.dims.ny || z >= self.dims.nz {
            return None;
        }
        self.tensors.get(self.dims.index(x, y, z))
    }
}

/// Scalar payload of a mask volume.
///
/// Only `Short` masks can gate a pass; the other variants exist so callers
/// handing over arbitrary label volumes get a configuration error instead of
/// a silent reinterpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskScalars {
    Short(Vec<i16>),
    UnsignedChar(Vec<u8>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl MaskScalars {
    pub fn len(&self) -> usize {
        match self {
            MaskScalars::Short(v) => v.len(),
            MaskScalars::UnsignedChar(v) => v.len(),
            MaskScalars::Int(v) => v.len(),
            MaskScalars::Float(v) => v.len(),
            MaskScalars::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MaskScalars::Short(_) => "short",
            MaskScalars::UnsignedChar(_) => "unsigned char",
            MaskScalars::Int(_) => "int",
            MaskScalars::Float(_) => "float",
            MaskScalars::Double(_) => "double",
        }
    }
}

/// Label volume gating which voxels are computed
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarMask {
    dims: Dims,
    scalars: MaskScalars,
}

impl ScalarMask {
    pub fn new(dims: Dims, scalars: MaskScalars) -> Result<Self> {
        if scalars.len() != dims.len() {
            return Err(Error::BufferLength {
                expected: dims.len(),
                actual: scalars.len(),
            });
        }
        Ok(Self { dims, scalars })
    }

    /// Convenience constructor for the supported i16 label type
    pub fn from_labels(dims: Dims, labels: Vec<i16>) -> Result<Self> {
        Self::new(dims, MaskScalars::Short(labels))
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn scalars(&self) -> &MaskScalars {
        &self.scalars
    }

    /// Label values, or an error if the mask is not of type short
    pub fn labels(&self) -> Result<&[i16]> {
        match &self.scalars {
            MaskScalars::Short(labels) => Ok(labels),
            other => Err(Error::MaskScalarType(other.type_name())),
        }
    }
}

/// Result grid of a pass: one float per voxel, or RGBA bytes for color operations
#[derive(Debug, Clone, PartialEq)]
pub enum OutputField {
    Scalar { dims: Dims, values: Vec<f32> },
    Color { dims: Dims, values: Vec<[u8; 4]> },
}

impl OutputField {
    /// Allocate a zeroed output of the kind `operation` writes
    pub fn for_operation(operation: Operation, dims: Dims) -> Self {
        if operation.is_color() {
            OutputField::Color {
                dims,
                values: vec![[0, 0, 0, 0]; dims.len()],
            }
        } else {
            OutputField::Scalar {
                dims,
                values: vec![0.0; dims.len()],
            }
        }
    }

    pub fn dims(&self) -> Dims {
        match self {
            OutputField::Scalar { dims, .. } | OutputField::Color { dims, .. } => *dims,
        }
    }

    /// Number of components written per voxel
    pub fn components(&self) -> usize {
        match self {
            OutputField::Scalar { .. } => 1,
            OutputField::Color { .. } => 4,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            OutputField::Scalar { .. } => "scalar",
            OutputField::Color { .. } => "color",
        }
    }

    pub fn as_scalars(&self) -> Option<&[f32]> {
        match self {
            OutputField::Scalar { values, .. } => Some(values),
            OutputField::Color { .. } => None,
        }
    }

    pub fn as_colors(&self) -> Option<&[[u8; 4]]> {
        match self {
            OutputField::Color { values, .. } => Some(values),
            OutputField::Scalar { .. } => None,
        }
    }

    pub fn scalar_at(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        let dims = self.dims();
        if x >= dims.nx || y >= dims.ny || z >= dims.nz {
            return None;
        }
        self.as_scalars()?.get(dims.index(x, y, z)).copied()
    }

    pub fn color_at(&self, x: usize, y: usize, z: usize) -> Option<[u8; 4]> {
        let dims = self.dims();
        if x >= dims.nx || y >= dims.ny || z >= dims.nz {
            return None;
        }
        self.as_colors()?.get(dims.index(x, y, z)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::diagonal_tensor;

    #[test]
    fn test_index_position_roundtrip() {
        let dims = Dims::new(4, 3, 2);
        assert_eq!(dims.len(), 24);
        assert_eq!(dims.index(1, 0, 0), 1);
        assert_eq!(dims.index(0, 1, 0), 4);
        assert_eq!(dims.index(0, 0, 1), 12);

        for i in 0..dims.len() {
            let [x, y, z] = dims.position(i);
            assert_eq!(dims.index(x, y, z), i);
        }
    }

    #[test]
    fn test_from_components_rejects_bad_length() {
        let dims = Dims::new(2, 1, 1);
        let err = TensorField::from_components(dims, &[0.0; 17]).unwrap_err();
        assert!(matches!(err, Error::BufferLength { expected: 18, actual: 17 }));
    }

    #[test]
    fn test_from_components_row_major_per_voxel() {
        let dims = Dims::new(2, 1, 1);
        let components: Vec<f64> = (0..18).map(|v| v as f64).collect();
        let field = TensorField::from_components(dims, &components).unwrap();

        assert_eq!(field.len(), 2);
        assert_eq!(field.tensors()[0][(0, 1)], 1.0);
        assert_eq!(field.tensors()[0][(1, 0)], 3.0);
        assert_eq!(field.tensors()[1][(0, 0)], 9.0);
        assert_eq!(field.tensors()[1][(2, 2)], 17.0);
    }

    #[test]
    fn test_from_fn_is_x_fastest() {
        let dims = Dims::new(3, 2, 1);
        let field = TensorField::from_fn(dims, |x, y, _| diagonal_tensor(x as f64, y as f64, 0.0));

        assert_eq!(field.tensors()[1][(0, 0)], 1.0);
        assert_eq!(field.tensors()[3][(1, 1)], 1.0);
        assert_eq!(field.get(2, 1, 0).unwrap()[(0, 0)], 2.0);
        assert!(field.get(3, 0, 0).is_none());
    }

    #[test]
    fn test_mask_type_check() {
        let dims = Dims::new(2, 1, 1);
        let short = ScalarMask::from_labels(dims, vec![1, 0]).unwrap();
        assert_eq!(short.labels().unwrap(), &[1, 0]);

        let float = ScalarMask::new(dims, MaskScalars::Float(vec![1.0, 0.0])).unwrap();
        assert!(matches!(float.labels(), Err(Error::MaskScalarType("float"))));
    }

    #[test]
    fn test_output_kind_follows_operation() {
        let dims = Dims::new(2, 2, 2);
        let scalar = OutputField::for_operation(Operation::FractionalAnisotropy, dims);
        let color = OutputField::for_operation(Operation::ColorByOrientation, dims);

        assert_eq!(scalar.components(), 1);
        assert_eq!(color.components(), 4);
        assert_eq!(color.as_colors().unwrap().len(), 8);
        assert!(scalar.as_colors().is_none());
    }
}
