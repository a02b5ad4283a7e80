// Tensor map generator: runs tensor math passes over a synthetic phantom
//
// Usage: tensor_maps [config.json]

use diffusion_tensor_math::geometry::tensor_from_eigensystem;
use diffusion_tensor_math::{
    Dims, FieldSampler, Operation, OutputField, PassControl, ScalarMask, TensorField,
    TensorMathConfig,
};
use nalgebra::Rotation3;
use std::f64::consts::PI;

/// Typical white-matter diffusivities in mm^2/s
const FIBER_EIGENVALUES: [f64; 3] = [1.7e-3, 0.3e-3, 0.3e-3];
const FREE_WATER: f64 = 3.0e-3;

fn main() -> diffusion_tensor_math::Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TensorMathConfig::from_json_file(path)?,
        None => TensorMathConfig::for_operation(Operation::Mode),
    };

    let dims = Dims::new(48, 48, 12);
    let field = phantom(dims);
    let mask = brain_mask(dims)?;
    log::info!("Built {}x{}x{} phantom", dims.nx, dims.ny, dims.nz);

    // Configured pass, with progress
    let sampler = FieldSampler::new(config.clone());
    let mut output = OutputField::for_operation(config.operation, dims);
    let progress = |done: usize, total: usize| {
        if done == total || done % 4 == 0 {
            log::info!("  slice {}/{}", done, total);
        }
    };
    let control = PassControl::default().with_progress(&progress);
    let report = sampler.run_into(&field, Some(&mask), &mut output, &control)?;
    log::info!("{}: {} voxels computed", config.operation, report.computed());
    summarize(config.operation, &output);

    // Standard maps
    let fa_config = TensorMathConfig {
        operation: Operation::FractionalAnisotropy,
        mask_with_scalars: true,
        ..config.clone()
    };
    let fa = FieldSampler::new(fa_config).run(&field, Some(&mask))?;
    summarize(Operation::FractionalAnisotropy, &fa.output);

    let color_config = TensorMathConfig {
        operation: Operation::ColorByOrientation,
        scale_factor: 1000.0,
        mask_with_scalars: true,
        ..config
    };
    let color = FieldSampler::new(color_config).run(&field, Some(&mask))?;
    summarize(Operation::ColorByOrientation, &color.output);

    Ok(())
}

/// Fibers bending in the xy-plane around the volume center, with a
/// free-water ventricle in the middle
fn phantom(dims: Dims) -> TensorField {
    let cx = dims.nx as f64 / 2.0;
    let cy = dims.ny as f64 / 2.0;

    TensorField::from_fn(dims, |x, y, _| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let radius = (dx * dx + dy * dy).sqrt();

        if radius < dims.nx as f64 / 8.0 {
            return tensor_from_eigensystem([FREE_WATER; 3], &nalgebra::Matrix3::identity());
        }

        // Tangential fiber direction
        let angle = dy.atan2(dx) + PI / 2.0;
        let frame = Rotation3::from_euler_angles(0.0, 0.0, angle);
        tensor_from_eigensystem(FIBER_EIGENVALUES, frame.matrix())
    })
}

/// Label 1 inside an ellipse covering most of each slice, 0 outside
fn brain_mask(dims: Dims) -> diffusion_tensor_math::Result<ScalarMask> {
    let cx = dims.nx as f64 / 2.0;
    let cy = dims.ny as f64 / 2.0;
    let mut labels = Vec::with_capacity(dims.len());

    for _z in 0..dims.nz {
        for y in 0..dims.ny {
            for x in 0..dims.nx {
                let u = (x as f64 - cx) / (0.45 * dims.nx as f64);
                let v = (y as f64 - cy) / (0.45 * dims.ny as f64);
                labels.push(if u * u + v * v <= 1.0 { 1 } else { 0 });
            }
        }
    }

    ScalarMask::from_labels(dims, labels)
}

fn summarize(operation: Operation, output: &OutputField) {
    match output {
        OutputField::Scalar { values, .. } => {
            let finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
            let min = finite.iter().copied().fold(f32::INFINITY, f32::min);
            let max = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let mean = finite.iter().sum::<f32>() / finite.len().max(1) as f32;
            log::info!(
                "{}: min {:.4}, max {:.4}, mean {:.4} ({} non-finite)",
                operation,
                min,
                max,
                mean,
                values.len() - finite.len()
            );
        }
        OutputField::Color { values, .. } => {
            let mut dominant = [0usize; 3];
            for rgba in values {
                let [r, g, b, _] = *rgba;
                if r == 0 && g == 0 && b == 0 {
                    continue;
                }
                let channel = if r >= g && r >= b { 0 } else if g >= b { 1 } else { 2 };
                dominant[channel] += 1;
            }
            log::info!(
                "{}: dominant red {}, green {}, blue {} voxels",
                operation,
                dominant[0],
                dominant[1],
                dominant[2]
            );
        }
    }
}
