// Field sampler: runs one operation over every voxel of a tensor field
//
// All fatal checks happen before the first voxel is written. The voxel loop
// itself never fails; degenerate voxels are counted in the PassReport.
// Work is split into z-slices, processed in parallel with rayon.

use crate::config::TensorMathConfig;
use crate::correction::correct;
use crate::eigen::{EigenAnalyzer, InvalidTensorError};
use crate::geometry::{self, Tensor};
use crate::metrics::{MetricComputer, VoxelValue};
use crate::operation::Plan;
use crate::volume::{Dims, OutputField, ScalarMask, TensorField};
use crate::{colormap, Error, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Cancellation flag and progress callback for a pass.
///
/// Both are checked once per z-slice. `progress` receives
/// `(completed_slices, total_slices)`.
#[derive(Clone, Copy, Default)]
pub struct PassControl<'a> {
    pub cancel: Option<&'a AtomicBool>,
    pub progress: Option<&'a (dyn Fn(usize, usize) + Sync)>,
}

impl<'a> PassControl<'a> {
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: &'a (dyn Fn(usize, usize) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

/// Diagnostics collected during a pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Voxels visited, masked ones included
    pub voxels: usize,

    /// Voxels skipped by the label mask
    pub masked: usize,

    /// Voxels whose eigenvalues needed negative-value correction
    pub corrected: usize,

    /// Voxels whose eigenvalues were not descending after correction
    pub unordered: usize,

    /// Voxels with non-finite tensors (only when validation is enabled)
    pub invalid_tensors: Vec<InvalidTensorError>,
}

impl PassReport {
    /// Combine the reports of two disjoint voxel ranges
    pub fn merge(mut self, other: PassReport) -> PassReport {
        self.voxels += other.voxels;
        self.masked += other.masked;
        self.corrected += other.corrected;
        self.unordered += other.unordered;
        self.invalid_tensors.extend(other.invalid_tensors);
        self
    }

    /// Voxels for which the operation was actually evaluated
    pub fn computed(&self) -> usize {
        self.voxels - self.masked - self.invalid_tensors.len()
    }
}

/// Output and diagnostics of a pass
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub output: OutputField,
    pub report: PassReport,
}

/// Element type of an output buffer
trait OutputSample: Copy + Send {
    /// Value written for masked and invalid voxels
    const MASKED: Self;

    fn from_value(value: VoxelValue, scale_factor: f64) -> Self;
}

impl OutputSample for f32 {
    const MASKED: Self = 0.0;

    fn from_value(value: VoxelValue, scale_factor: f64) -> Self {
        match value {
            VoxelValue::Scalar(v) if scale_factor != 1.0 => (v * scale_factor) as f32,
            VoxelValue::Scalar(v) => v as f32,
            VoxelValue::Color(_) => Self::MASKED,
        }
    }
}

impl OutputSample for [u8; 4] {
    const MASKED: Self = [0, 0, 0, colormap::OPAQUE];

    // Color outputs ignore the scalar scale factor
    fn from_value(value: VoxelValue, _scale_factor: f64) -> Self {
        match value {
            VoxelValue::Color(rgba) => rgba,
            VoxelValue::Scalar(_) => Self::MASKED,
        }
    }
}

/// Read-only state shared by all slice workers
struct SliceContext<'a> {
    tensors: &'a [Tensor],
    labels: Option<&'a [i16]>,
    dims: Dims,
    control: PassControl<'a>,
    completed: AtomicUsize,
    total: usize,
}

/// Computes one configured operation over whole tensor fields
#[derive(Debug, Clone)]
pub struct FieldSampler {
    config: TensorMathConfig,
    plan: Plan,
    analyzer: EigenAnalyzer,
    metrics: MetricComputer,
}

impl FieldSampler {
    pub fn new(config: TensorMathConfig) -> Self {
        let plan = config.operation.plan();
        let analyzer = EigenAnalyzer::new(config.eigen_mode());
        let metrics = MetricComputer::new(config.scale_factor, config.rotation());

        Self {
            config,
            plan,
            analyzer,
            metrics,
        }
    }

    pub fn config(&self) -> &TensorMathConfig {
        &self.config
    }

    /// Run a pass into a freshly allocated output field
    pub fn run(&self, field: &TensorField, mask: Option<&ScalarMask>) -> Result<PassOutput> {
        let mut output = OutputField::for_operation(self.config.operation, field.dims());
        let report = self.run_into(field, mask, &mut output, &PassControl::default())?;
        Ok(PassOutput { output, report })
    }

    /// Run a pass into a caller-allocated output field.
    ///
    /// On any error other than `Cancelled` the output is left untouched.
    pub fn run_into(
        &self,
        field: &TensorField,
        mask: Option<&ScalarMask>,
        output: &mut OutputField,
        control: &PassControl,
    ) -> Result<PassReport> {
        let labels = self.check_inputs(field, mask, output)?;
        let dims = field.dims();

        log::info!(
            "Computing {} over {}x{}x{} voxels (parallel: {})",
            self.config.operation,
            dims.nx,
            dims.ny,
            dims.nz,
            self.config.parallel
        );

        let ctx = SliceContext {
            tensors: field.tensors(),
            labels,
            dims,
            control: *control,
            completed: AtomicUsize::new(0),
            total: dims.nz,
        };

        let report = match output {
            OutputField::Scalar { values, .. } => self.fill(&ctx, values)?,
            OutputField::Color { values, .. } => self.fill(&ctx, values)?,
        };

        log::info!(
            "{} done: {} voxels, {} masked, {} corrected",
            self.config.operation,
            report.voxels,
            report.masked,
            report.corrected
        );
        if report.unordered > 0 {
            log::warn!(
                "{} voxels had eigenvalues out of descending order after correction",
                report.unordered
            );
        }
        if !report.invalid_tensors.is_empty() {
            log::warn!(
                "{} voxels had non-finite tensors (first: {})",
                report.invalid_tensors.len(),
                report.invalid_tensors[0]
            );
        }

        Ok(report)
    }

    /// Value of the configured operation for a single tensor
    pub fn evaluate(&self, tensor: &Tensor) -> VoxelValue {
        self.evaluate_voxel(tensor, &mut PassReport::default())
    }

    /// Fatal checks. Returns the labels to mask with, if masking applies.
    fn check_inputs<'m>(
        &self,
        field: &TensorField,
        mask: Option<&'m ScalarMask>,
        output: &OutputField,
    ) -> Result<Option<&'m [i16]>> {
        self.config.validate()?;

        if field.is_empty() {
            return Err(Error::EmptyField);
        }
        let dims = field.dims();

        let labels = match mask {
            Some(mask) => {
                let labels = mask.labels()?;
                if mask.dims() != dims {
                    return Err(Error::DimensionMismatch {
                        expected: dims,
                        actual: mask.dims(),
                    });
                }
                Some(labels)
            }
            None => None,
        };

        if output.dims() != dims {
            return Err(Error::DimensionMismatch {
                expected: dims,
                actual: output.dims(),
            });
        }

        let expected = if self.config.operation.is_color() { "color" } else { "scalar" };
        if output.kind_name() != expected {
            return Err(Error::OutputKind {
                operation: self.config.operation,
                expected,
                actual: output.kind_name(),
            });
        }

        let output_len = match output {
            OutputField::Scalar { values, .. } => values.len(),
            OutputField::Color { values, .. } => values.len(),
        };
        if output_len != dims.len() {
            return Err(Error::BufferLength {
                expected: dims.len(),
                actual: output_len,
            });
        }

        if !self.config.mask_with_scalars {
            return Ok(None);
        }
        if labels.is_none() {
            log::warn!("Masking requested but no mask supplied; computing every voxel");
        }
        Ok(labels)
    }

    fn fill<T: OutputSample>(&self, ctx: &SliceContext, values: &mut [T]) -> Result<PassReport> {
        let slice_len = ctx.dims.slice_len();
        let keep = |a: Option<PassReport>, b: Option<PassReport>| match (a, b) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            _ => None,
        };

        let report = if self.config.parallel {
            values
                .par_chunks_mut(slice_len)
                .enumerate()
                .map(|(z, slice)| self.visit_slice(ctx, z, slice))
                .reduce(|| Some(PassReport::default()), keep)
        } else {
            values
                .chunks_mut(slice_len)
                .enumerate()
                .map(|(z, slice)| self.visit_slice(ctx, z, slice))
                .fold(Some(PassReport::default()), keep)
        };

        report.ok_or_else(|| Error::Cancelled {
            completed: ctx.completed.load(Ordering::Relaxed),
            total: ctx.total,
        })
    }

    /// Process one z-slice. None when the pass was cancelled before it started.
    fn visit_slice<T: OutputSample>(
        &self,
        ctx: &SliceContext,
        z: usize,
        slice: &mut [T],
    ) -> Option<PassReport> {
        if ctx.control.is_cancelled() {
            return None;
        }

        let mut report = PassReport::default();
        let base = z * ctx.dims.slice_len();

        for (offset, out) in slice.iter_mut().enumerate() {
            let index = base + offset;
            report.voxels += 1;

            if let Some(labels) = ctx.labels {
                if labels[index] != self.config.mask_label_value {
                    *out = T::MASKED;
                    report.masked += 1;
                    continue;
                }
            }

            let tensor = &ctx.tensors[index];
            if self.config.validate_tensors && !geometry::is_finite(tensor) {
                report.invalid_tensors.push(InvalidTensorError {
                    index,
                    position: ctx.dims.position(index),
                });
                *out = T::MASKED;
                continue;
            }

            let value = self.evaluate_voxel(tensor, &mut report);
            *out = T::from_value(value, self.config.scale_factor);
        }

        let completed = ctx.completed.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("Slice {} done ({}/{})", z, completed, ctx.total);
        if let Some(progress) = ctx.control.progress {
            progress(completed, ctx.total);
        }

        Some(report)
    }

    fn evaluate_voxel(&self, tensor: &Tensor, report: &mut PassReport) -> VoxelValue {
        if let Plan::Tensor(op) = self.plan {
            return VoxelValue::Scalar(self.metrics.tensor_scalar(op, tensor));
        }

        let mut eigen = self.analyzer.analyze(tensor);
        if self.config.fix_negative_eigenvalues {
            let correction = correct(eigen.values);
            if correction.changed() {
                report.corrected += 1;
            }
            if !correction.ordered {
                report.unordered += 1;
            }
            eigen.values = correction.values;
        }

        self.metrics.evaluate(self.plan, tensor, Some(&eigen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{diagonal_tensor, tensor_from_eigensystem};
    use crate::operation::Operation;
    use crate::volume::MaskScalars;
    use rand::{Rng, SeedableRng};
    use std::sync::Mutex;

    fn sampler(operation: Operation) -> FieldSampler {
        FieldSampler::new(TensorMathConfig::for_operation(operation))
    }

    fn checkerboard(dims: Dims) -> ScalarMask {
        let labels = (0..dims.len()).map(|i| (i % 2) as i16).collect();
        ScalarMask::from_labels(dims, labels).unwrap()
    }

    fn random_field(dims: Dims, seed: u64) -> TensorField {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        TensorField::from_fn(dims, |_, _, _| {
            let rotation = nalgebra::Rotation3::from_euler_angles(
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-1.5..1.5),
                rng.gen_range(-3.0..3.0),
            );
            let values = [
                rng.gen_range(0.5..3.0),
                rng.gen_range(0.1..1.0),
                rng.gen_range(-0.2..0.5),
            ];
            tensor_from_eigensystem(values, rotation.matrix())
        })
    }

    #[test]
    fn test_trace_and_determinant_scaled() {
        let dims = Dims::new(2, 2, 2);
        let field = TensorField::uniform(dims, diagonal_tensor(3.0, 2.0, 1.0));

        for operation in [Operation::Trace, Operation::Determinant] {
            let config = TensorMathConfig {
                operation,
                scale_factor: 2.0,
                ..Default::default()
            };
            let pass = FieldSampler::new(config).run(&field, None).unwrap();
            let values = pass.output.as_scalars().unwrap();

            assert!(values.iter().all(|&v| (v - 12.0).abs() < 1e-6), "{:?}", values);
            assert_eq!(pass.report.voxels, 8);
        }
    }

    #[test]
    fn test_isotropic_field_metrics() {
        let field = TensorField::uniform(Dims::new(3, 2, 1), diagonal_tensor(1.0, 1.0, 1.0));

        let fa = sampler(Operation::FractionalAnisotropy).run(&field, None).unwrap();
        let ra = sampler(Operation::RelativeAnisotropy).run(&field, None).unwrap();
        let cs = sampler(Operation::SphericalMeasure).run(&field, None).unwrap();

        assert!(fa.output.as_scalars().unwrap().iter().all(|v| v.abs() < 1e-6));
        assert!(ra.output.as_scalars().unwrap().iter().all(|v| v.abs() < 1e-6));
        assert!(cs.output.as_scalars().unwrap().iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_all_negative_eigenvalues_give_zero_fa() {
        let field = TensorField::uniform(Dims::new(2, 2, 1), diagonal_tensor(-1.0, -1.0, -1.0));
        let pass = sampler(Operation::FractionalAnisotropy).run(&field, None).unwrap();

        assert!(pass.output.as_scalars().unwrap().iter().all(|&v| v == 0.0));
        assert_eq!(pass.report.corrected, 4);
    }

    #[test]
    fn test_correction_toggle() {
        let field = TensorField::uniform(Dims::new(1, 1, 1), diagonal_tensor(1.0, 1.0, -1.0));

        let fixed = sampler(Operation::MinEigenvalue).run(&field, None).unwrap();
        assert_eq!(fixed.output.scalar_at(0, 0, 0), Some(0.0));

        let raw = FieldSampler::new(TensorMathConfig {
            operation: Operation::MinEigenvalue,
            fix_negative_eigenvalues: false,
            ..Default::default()
        })
        .run(&field, None)
        .unwrap();
        let value = raw.output.scalar_at(0, 0, 0).unwrap();
        assert!((value + 1.0).abs() < 1e-6);
        assert_eq!(raw.report.corrected, 0);
    }

    #[test]
    fn test_scalar_mask() {
        let dims = Dims::new(4, 3, 2);
        let field = TensorField::uniform(dims, diagonal_tensor(3.0, 1.0, 0.5));
        let mask = checkerboard(dims);

        let config = TensorMathConfig {
            operation: Operation::FractionalAnisotropy,
            mask_with_scalars: true,
            ..Default::default()
        };
        let pass = FieldSampler::new(config).run(&field, Some(&mask)).unwrap();
        let values = pass.output.as_scalars().unwrap();

        for (i, &v) in values.iter().enumerate() {
            if i % 2 == 1 {
                assert!(v > 0.0);
            } else {
                assert_eq!(v, 0.0);
            }
        }
        assert_eq!(pass.report.masked, dims.len() / 2);
        assert_eq!(pass.report.computed(), dims.len() / 2);
    }

    #[test]
    fn test_mask_ignored_when_disabled() {
        let dims = Dims::new(2, 2, 1);
        let field = TensorField::uniform(dims, diagonal_tensor(3.0, 2.0, 1.0));
        let pass = sampler(Operation::Trace).run(&field, Some(&checkerboard(dims))).unwrap();

        assert!(pass.output.as_scalars().unwrap().iter().all(|&v| v == 6.0));
        assert_eq!(pass.report.masked, 0);
    }

    #[test]
    fn test_masked_color_is_opaque_black() {
        let dims = Dims::new(2, 2, 2);
        let field = TensorField::uniform(dims, diagonal_tensor(2.0, 0.5, 0.5));
        let labels = vec![7; dims.len()];
        let mask = ScalarMask::from_labels(dims, labels).unwrap();

        for operation in [
            Operation::ColorByMode,
            Operation::ColorByOrientation,
            Operation::ColorByMidEigenvector,
            Operation::ColorByMinEigenvector,
        ] {
            let config = TensorMathConfig {
                operation,
                scale_factor: 1000.0,
                mask_with_scalars: true,
                ..Default::default()
            };
            let pass = FieldSampler::new(config).run(&field, Some(&mask)).unwrap();
            assert!(pass.output.as_colors().unwrap().iter().all(|&c| c == [0, 0, 0, 255]));
        }
    }

    #[test]
    fn test_custom_mask_label() {
        let dims = Dims::new(3, 1, 1);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));
        let mask = ScalarMask::from_labels(dims, vec![3, 1, 3]).unwrap();

        let config = TensorMathConfig {
            operation: Operation::Trace,
            mask_with_scalars: true,
            mask_label_value: 3,
            ..Default::default()
        };
        let pass = FieldSampler::new(config).run(&field, Some(&mask)).unwrap();
        assert_eq!(pass.output.as_scalars().unwrap(), &[3.0, 0.0, 3.0]);
    }

    #[test]
    fn test_masking_without_mask_computes_everything() {
        let dims = Dims::new(2, 1, 1);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));
        let config = TensorMathConfig {
            mask_with_scalars: true,
            ..Default::default()
        };
        let pass = FieldSampler::new(config).run(&field, None).unwrap();
        assert_eq!(pass.output.as_scalars().unwrap(), &[3.0, 3.0]);
    }

    #[test]
    fn test_orientation_color() {
        let field = TensorField::uniform(Dims::new(2, 1, 1), diagonal_tensor(2.0, 0.5, 0.5));
        let config = TensorMathConfig {
            operation: Operation::ColorByOrientation,
            scale_factor: 1000.0,
            ..Default::default()
        };
        let pass = FieldSampler::new(config).run(&field, None).unwrap();

        // Principal direction x, linear measure 0.75
        assert_eq!(pass.output.color_at(0, 0, 0), Some([191, 0, 0, 255]));
    }

    #[test]
    fn test_columns_mode_counts_unordered() {
        let t = Tensor::new(
            3.0, 0.0, 0.0,
            4.0, 0.0, 0.0,
            0.0, 0.0, 2.0,
        );
        let field = TensorField::uniform(Dims::new(2, 2, 1), t);
        let config = TensorMathConfig {
            operation: Operation::MaxEigenvalue,
            extract_eigenvalues: false,
            ..Default::default()
        };
        let pass = FieldSampler::new(config).run(&field, None).unwrap();

        assert!(pass.output.as_scalars().unwrap().iter().all(|&v| v == 5.0));
        assert_eq!(pass.report.unordered, 4);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dims = Dims::new(5, 4, 6);
        let field = random_field(dims, 11);

        for operation in [
            Operation::FractionalAnisotropy,
            Operation::Mode,
            Operation::RaiMaxEigenvecZ,
            Operation::ColorByOrientation,
            Operation::ColorByMode,
        ] {
            let parallel = FieldSampler::new(TensorMathConfig {
                operation,
                parallel: true,
                ..Default::default()
            })
            .run(&field, None)
            .unwrap();
            let sequential = FieldSampler::new(TensorMathConfig {
                operation,
                parallel: false,
                ..Default::default()
            })
            .run(&field, None)
            .unwrap();

            assert_eq!(parallel.output, sequential.output, "{}", operation);
            assert_eq!(parallel.report, sequential.report);
        }
    }

    #[test]
    fn test_empty_field_rejected() {
        let field = TensorField::new(Dims::new(0, 4, 4), Vec::new()).unwrap();
        let result = sampler(Operation::Trace).run(&field, None);
        assert!(matches!(result, Err(Error::EmptyField)));
    }

    #[test]
    fn test_non_short_mask_rejected_before_writing() {
        let dims = Dims::new(2, 2, 1);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));
        let mask = ScalarMask::new(dims, MaskScalars::Float(vec![1.0; 4])).unwrap();

        let mut output = OutputField::Scalar {
            dims,
            values: vec![7.0; 4],
        };
        let result = sampler(Operation::Trace).run_into(&field, Some(&mask), &mut output, &PassControl::default());

        assert!(matches!(result, Err(Error::MaskScalarType("float"))));
        assert_eq!(output.as_scalars().unwrap(), &[7.0; 4]);
    }

    #[test]
    fn test_dimension_mismatches_rejected() {
        let dims = Dims::new(2, 2, 1);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));

        let mask = checkerboard(Dims::new(4, 1, 1));
        let result = sampler(Operation::Trace).run(&field, Some(&mask));
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));

        let mut output = OutputField::for_operation(Operation::Trace, Dims::new(2, 2, 2));
        let result = sampler(Operation::Trace).run_into(&field, None, &mut output, &PassControl::default());
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_wrong_output_kind_rejected() {
        let dims = Dims::new(2, 2, 1);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));

        let mut output = OutputField::for_operation(Operation::Trace, dims);
        let result =
            sampler(Operation::ColorByMode).run_into(&field, None, &mut output, &PassControl::default());

        assert!(matches!(
            result,
            Err(Error::OutputKind { expected: "color", actual: "scalar", .. })
        ));
    }

    #[test]
    fn test_short_output_buffer_rejected() {
        let dims = Dims::new(2, 2, 1);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));
        let mut output = OutputField::Scalar {
            dims,
            values: vec![0.0; 3],
        };

        let result = sampler(Operation::Trace).run_into(&field, None, &mut output, &PassControl::default());
        assert!(matches!(result, Err(Error::BufferLength { expected: 4, actual: 3 })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let field = TensorField::uniform(Dims::new(1, 1, 1), diagonal_tensor(1.0, 1.0, 1.0));
        let config = TensorMathConfig {
            scale_factor: f64::INFINITY,
            ..Default::default()
        };
        let result = FieldSampler::new(config).run(&field, None);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_cancelled_pass() {
        let dims = Dims::new(2, 2, 3);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));
        let mut output = OutputField::for_operation(Operation::Trace, dims);

        let cancel = AtomicBool::new(true);
        let control = PassControl::default().with_cancel(&cancel);
        let result = sampler(Operation::Trace).run_into(&field, None, &mut output, &control);

        assert!(matches!(result, Err(Error::Cancelled { completed: 0, total: 3 })));
    }

    #[test]
    fn test_progress_reports_every_slice() {
        let dims = Dims::new(2, 2, 4);
        let field = TensorField::uniform(dims, diagonal_tensor(1.0, 1.0, 1.0));
        let mut output = OutputField::for_operation(Operation::Trace, dims);

        let calls = Mutex::new(Vec::new());
        let progress = |done: usize, total: usize| calls.lock().unwrap().push((done, total));
        let control = PassControl::default().with_progress(&progress);

        let config = TensorMathConfig {
            parallel: false,
            ..Default::default()
        };
        FieldSampler::new(config).run_into(&field, None, &mut output, &control).unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_invalid_tensors_reported() {
        let dims = Dims::new(3, 2, 1);
        let field = TensorField::from_fn(dims, |x, y, _| {
            if x == 2 && y == 1 {
                diagonal_tensor(f64::NAN, 1.0, 1.0)
            } else {
                diagonal_tensor(2.0, 1.0, 1.0)
            }
        });
        let config = TensorMathConfig {
            operation: Operation::FractionalAnisotropy,
            validate_tensors: true,
            ..Default::default()
        };
        let pass = FieldSampler::new(config).run(&field, None).unwrap();

        assert_eq!(
            pass.report.invalid_tensors,
            vec![InvalidTensorError { index: 5, position: [2, 1, 0] }]
        );
        assert_eq!(pass.output.scalar_at(2, 1, 0), Some(0.0));
        assert!(pass.output.scalar_at(0, 0, 0).unwrap() > 0.0);
    }

    #[test]
    fn test_non_finite_without_validation_propagates() {
        let field = TensorField::uniform(Dims::new(1, 1, 1), diagonal_tensor(f64::NAN, 1.0, 1.0));
        let pass = sampler(Operation::FractionalAnisotropy).run(&field, None).unwrap();

        assert!(pass.output.scalar_at(0, 0, 0).unwrap().is_nan());
        assert!(pass.report.invalid_tensors.is_empty());
    }

    #[test]
    fn test_evaluate_single_tensor() {
        let value = sampler(Operation::MeanDiffusivity).evaluate(&diagonal_tensor(3.0, 2.0, 1.0));
        match value {
            VoxelValue::Scalar(v) => assert!((v - 2.0).abs() < 1e-12),
            other => panic!("expected scalar, got {:?}", other),
        }
    }
}
