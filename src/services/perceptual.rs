//! Perceptual color difference
//!
//! sRGB -> CIE XYZ (D65) -> CIE L*a*b*, compared with the CIE94 formula.

use crate::models::{Lab, Rgb};

// D65 reference white, Y normalized to 1
const WHITE_X: f64 = 0.95047;
const WHITE_Y: f64 = 1.0;
const WHITE_Z: f64 = 1.08883;

// CIE94 graphic arts constants
const K_L: f64 = 1.0;
const K_1: f64 = 0.045;
const K_2: f64 = 0.015;

/// sRGB transfer function, 8-bit channel to linear light
#[inline]
pub fn srgb_to_linear(channel: u8) -> f64 {
    let x = channel as f64 / 255.0;
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// Inverse sRGB transfer function, clamped to `[0, 1]`
#[inline]
pub fn linear_to_srgb(value: f64) -> f64 {
    let c = value.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Linear RGB in `[0, 1]` to the nearest 8-bit sRGB color
pub fn linear_to_rgb(linear: [f64; 3]) -> Rgb {
    let quantize = |c: f64| {
        let encoded = linear_to_srgb(if c.is_finite() { c } else { 0.0 });
        (encoded * 255.0).round() as u8
    };
    Rgb::new(quantize(linear[0]), quantize(linear[1]), quantize(linear[2]))
}

pub fn rgb_to_xyz(rgb: Rgb) -> [f64; 3] {
    let r = srgb_to_linear(rgb.r);
    let g = srgb_to_linear(rgb.g);
    let b = srgb_to_linear(rgb.b);
    [
        0.4124564 * r + 0.3575761 * g + 0.1804375 * b,
        0.2126729 * r + 0.7151522 * g + 0.0721750 * b,
        0.0193339 * r + 0.1191920 * g + 0.9503041 * b,
    ]
}

pub fn xyz_to_lab(xyz: [f64; 3]) -> Lab {
    // CIE constants in exact rational form
    const EPSILON: f64 = 216.0 / 24389.0;
    const KAPPA: f64 = 24389.0 / 27.0;

    let f = |t: f64| {
        if t > EPSILON {
            t.cbrt()
        } else {
            (KAPPA * t + 16.0) / 116.0
        }
    };

    let fx = f(xyz[0] / WHITE_X);
    let fy = f(xyz[1] / WHITE_Y);
    let fz = f(xyz[2] / WHITE_Z);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

pub fn rgb_to_lab(rgb: Rgb) -> Lab {
    xyz_to_lab(rgb_to_xyz(rgb))
}

/// CIE94 color difference
///
/// The chroma and hue weights come from `reference`, so the result is not
/// symmetric in its arguments. It is a ranking score, not a distance.
pub fn delta_e94(reference: &Lab, sample: &Lab) -> f64 {
    let dl = reference.l - sample.l;
    let c1 = reference.chroma();
    let c2 = sample.chroma();
    let dc = c1 - c2;
    let da = reference.a - sample.a;
    let db = reference.b - sample.b;

    // Rounding can make this slightly negative for near-identical hues
    let dh_sq = (da * da + db * db - dc * dc).max(0.0);

    let sl = 1.0;
    let sc = 1.0 + K_1 * c1;
    let sh = 1.0 + K_2 * c1;

    let term_l = dl / (K_L * sl);
    let term_c = dc / sc;
    (term_l * term_l + term_c * term_c + dh_sq / (sh * sh)).sqrt()
}

/// Match percentage shown to the user: `100 - delta`, clamped to `[0, 100]`
pub fn match_pct(delta_e: f64) -> f64 {
    (100.0 - delta_e).clamp(0.0, 100.0)
}

/// Whether light text reads better on a swatch of this color (BT.709 luma)
pub fn is_dark(rgb: Rgb) -> bool {
    let luma = 0.2126 * rgb.r as f64 + 0.7152 * rgb.g as f64 + 0.0722 * rgb.b as f64;
    luma < 80.0
}
