// Colormaps for tensor shape and orientation
//
// Mode colors use a hue wheel restricted to four of its six sextants, running
// from blue (planar, mode -1) through green to red (linear, mode +1), with
// intensity given by fractional anisotropy.

use crate::geometry::Vector3D;

/// Mode is clamped to +/- this value before mapping to hue
pub const MODE_LIMIT: f64 = 0.9999;

/// Fully opaque alpha channel
pub const OPAQUE: u8 = u8::MAX;

/// Width of one hue sextant in a 256-entry lookup table
const INDEX_SEXTANT: f64 = 256.0 / 6.0;

/// Map a tensor mode in [-1, 1] and an FA weight to RGB in [0, 1].
///
/// The color is multiplied by `fa`, so isotropic voxels (FA = 0) come out
/// black rather than gray.
pub fn mode_to_rgb(mode: f64, fa: f64) -> [f64; 3] {
    // Invert so planar (negative) maps to blue and linear to red
    let mode = -mode.clamp(-MODE_LIMIT, MODE_LIMIT);

    // Hue in [0, 6), restricted to the first four sextants
    let hue = 3.0 * (mode + 1.0) * (4.0 / 6.0);
    let sextant = hue.floor();
    let frac = hue - sextant;

    let [r, g, b] = match sextant as i64 {
        0 => [1.0, frac, 0.0],
        1 => [1.0 - frac, 1.0, 0.0],
        2 => [0.0, 1.0, frac],
        3 => [0.0, 1.0 - frac, 1.0],
        4 => [frac, 0.0, 1.0],
        _ => [1.0, 0.0, 1.0 - frac],
    };

    [fa * r, fa * g, fa * b]
}

/// Inverse of the hue wheel: map an RGB color onto a 0..256 lookup-table index.
///
/// The gray part is removed first (smallest channel set to 0, largest scaled
/// to 1), so any saturation or intensity of a wheel color maps to the same
/// index. Gray colors map to 0.
pub fn rgb_to_index(r: f64, g: f64, b: f64) -> f64 {
    if (r - g).abs() < 1e-5 && (r - b).abs() < 1e-5 {
        return 0.0;
    }

    let channels = [r, g, b];
    let (min_idx, min) = channels
        .iter()
        .copied()
        .enumerate()
        .fold((0, r), |acc, (i, v)| if v < acc.1 { (i, v) } else { acc });

    let shifted = channels.map(|c| c - min);
    let (max_idx, max) = shifted
        .iter()
        .copied()
        .enumerate()
        .fold((0, shifted[0]), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });

    let [r, g, b] = shifted.map(|c| c / max);

    let sextant = match (max_idx, min_idx) {
        (0, 2) => 0,
        (1, 2) => 1,
        (1, 0) => 2,
        (2, 0) => 3,
        (2, 1) => 4,
        (0, 1) => 5,
        _ => 0,
    };

    let offset = INDEX_SEXTANT * sextant as f64;
    match sextant {
        0 => offset + g * INDEX_SEXTANT,
        1 => offset + (1.0 - r) * INDEX_SEXTANT,
        2 => offset + b * INDEX_SEXTANT,
        3 => offset + (1.0 - g) * INDEX_SEXTANT,
        4 => offset + r * INDEX_SEXTANT,
        _ => offset + (1.0 - b) * INDEX_SEXTANT,
    }
}

/// Scale a unit-range channel into a byte, clamping to [0, 255].
/// NaN maps to 0.
pub fn to_byte(value: f64, rgb_scale: f64) -> u8 {
    let scaled = rgb_scale * value;
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, u8::MAX as f64) as u8
}

/// RGBA color for a tensor mode weighted by FA
pub fn mode_color(mode: f64, fa: f64, rgb_scale: f64) -> [u8; 4] {
    let [r, g, b] = mode_to_rgb(mode, fa);
    [
        to_byte(r, rgb_scale),
        to_byte(g, rgb_scale),
        to_byte(b, rgb_scale),
        OPAQUE,
    ]
}

/// RGBA color for a direction: channel i is |direction_i| weighted by `weight`
/// (the linear measure for orientation maps)
pub fn orientation_color(direction: &Vector3D, weight: f64, rgb_scale: f64) -> [u8; 4] {
    [
        to_byte(direction.x.abs() * weight, rgb_scale),
        to_byte(direction.y.abs() * weight, rgb_scale),
        to_byte(direction.z.abs() * weight, rgb_scale),
        OPAQUE,
    ]
}
