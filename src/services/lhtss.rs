//! LHTSS (Least Hyperbolic Tangent Slope Squared) spectral upsampling
//!
//! Reconstructs a smooth reflectance curve in `(0, 1)` whose linear sRGB
//! projection matches a given color. The curve is parameterized as
//! `rho = (tanh(z) + 1) / 2` and the slope of `z` is minimized subject to
//! `T * rho = rgb`, solved with a damped Newton iteration on the Lagrangian.

use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array1, Array2};
use tracing::trace;

use crate::models::{ColorError, Rgb};
use crate::services::perceptual::srgb_to_linear;

/// Number of spectral bands, 380nm to 730nm in 10nm steps
pub const BANDS: usize = 36;

const MAX_ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-8;
/// Largest change of any `z` per Newton step
const MAX_STEP: f64 = 2.0;
/// Keeps targets off the `(0, 1)` boundary, which is only reached asymptotically
const TARGET_MARGIN: f64 = 1e-4;
/// Accepted squared RGB error when the iteration stalls short of `TOLERANCE`
const MAX_STALLED_ERROR: f64 = 1e-2;
/// Reflectance used for pure black
const BLACK_REFLECTANCE: f64 = 1e-4;

/// LHTSS solver for a fixed reflectance-to-linear-sRGB matrix
#[derive(Clone)]
pub struct Lhtss {
    t_matrix: Array2<f64>,
    difference: Array2<f64>,
}

impl Default for Lhtss {
    fn default() -> Self {
        Self::new(default_t_matrix())
    }
}

impl Lhtss {
    /// Create a new solver with the given T-matrix (3x36 reflectance to linear sRGB)
    pub fn new(t_matrix: Array2<f64>) -> Self {
        assert_eq!(
            t_matrix.shape(),
            [3, BANDS],
            "T-matrix must be 3x{BANDS}, got {:?}",
            t_matrix.shape()
        );
        Self {
            t_matrix,
            difference: difference_matrix(),
        }
    }

    pub fn t_matrix(&self) -> &Array2<f64> {
        &self.t_matrix
    }

    /// Linear sRGB of a reflectance curve
    pub fn reflectance_to_linear_rgb(&self, reflectance: &Array1<f64>) -> [f64; 3] {
        let rgb = self.t_matrix.dot(reflectance);
        [rgb[0], rgb[1], rgb[2]]
    }

    /// Compute a reflectance curve for an sRGB color
    pub fn reflectance(&self, srgb: Rgb) -> Result<Array1<f64>, ColorError> {
        let channels = srgb.channels();
        // Black and white sit on the boundary of the (0, 1) range
        if channels.iter().all(|&x| x == 0) {
            return Ok(Array1::from_elem(BANDS, BLACK_REFLECTANCE));
        }
        if channels.iter().all(|&x| x == 255) {
            return Ok(Array1::from_elem(BANDS, 1.0));
        }

        let target = Array1::from_iter(
            channels
                .iter()
                .map(|&c| srgb_to_linear(c).clamp(TARGET_MARGIN, 1.0 - TARGET_MARGIN)),
        );

        let mut z: Array1<f64> = Array1::zeros(BANDS);
        let mut lambda: Array1<f64> = Array1::zeros(3);

        let mut best_rho = Array1::from_elem(BANDS, 0.5);
        let mut best_error = f64::MAX;

        for iteration in 0..MAX_ITERATIONS {
            let tanh = z.mapv(f64::tanh);
            // sech^2 via tanh stays finite for large |z|
            let sech2 = tanh.mapv(|t| 1.0 - t * t);
            let rho = tanh.mapv(|t| (t + 1.0) / 2.0);
            let d1 = &sech2 / 2.0;
            let d2 = -(&sech2 * &tanh);

            let t_lambda = self.t_matrix.t().dot(&lambda);
            let f1 = self.difference.dot(&z) + &d1 * &t_lambda;
            let f2 = self.t_matrix.dot(&rho) - &target;

            let constraint_error: f64 = f2.iter().map(|x| x * x).sum();
            if constraint_error < best_error {
                best_error = constraint_error;
                best_rho = rho.clone();
            }

            if f1.iter().chain(f2.iter()).all(|x| x.abs() < TOLERANCE) {
                trace!(%srgb, iteration, "lhtss converged");
                return Ok(rho);
            }

            let jacobian = self.jacobian(&d1, &d2, &t_lambda);
            let mut rhs: Array1<f64> = Array1::zeros(BANDS + 3);
            rhs.slice_mut(s![..BANDS]).assign(&f1.mapv(|x| -x));
            rhs.slice_mut(s![BANDS..]).assign(&f2.mapv(|x| -x));

            let delta = match solve_linear_system(&jacobian, &rhs) {
                Ok(delta) if delta.iter().all(|x| x.is_finite()) => delta,
                _ => break,
            };

            let dz = delta.slice(s![..BANDS]);
            let largest = dz.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
            let scale = if largest > MAX_STEP { MAX_STEP / largest } else { 1.0 };

            z.scaled_add(scale, &dz);
            lambda.scaled_add(scale, &delta.slice(s![BANDS..]));
        }

        // Saturated primaries converge slowly; a near solution is still a usable curve
        if best_error < MAX_STALLED_ERROR && best_rho.iter().all(|x| x.is_finite()) {
            trace!(%srgb, best_error, "lhtss stalled, using best iterate");
            return Ok(best_rho);
        }

        Err(ColorError::SpectralSolve(format!(
            "LHTSS did not converge for {srgb}, best error: {best_error:.6}"
        )))
    }

    fn jacobian(&self, d1: &Array1<f64>, d2: &Array1<f64>, t_lambda: &Array1<f64>) -> Array2<f64> {
        let n = BANDS;
        let mut j = Array2::zeros((n + 3, n + 3));

        let mut top_left = self.difference.clone();
        for i in 0..n {
            top_left[[i, i]] += d2[i] * t_lambda[i];
        }
        j.slice_mut(s![..n, ..n]).assign(&top_left);

        for k in 0..3 {
            for i in 0..n {
                let v = d1[i] * self.t_matrix[[k, i]];
                j[[i, n + k]] = v;
                j[[n + k, i]] = v;
            }
        }
        j
    }
}

/// Second-difference matrix penalizing slope between neighbouring bands
fn difference_matrix() -> Array2<f64> {
    let mut d = Array2::zeros((BANDS, BANDS));
    for i in 0..BANDS {
        d[[i, i]] = 4.0;
        if i > 0 {
            d[[i, i - 1]] = -2.0;
        }
        if i < BANDS - 1 {
            d[[i, i + 1]] = -2.0;
        }
    }
    d[[0, 0]] = 2.0;
    d[[BANDS - 1, BANDS - 1]] = 2.0;
    d
}

fn solve_linear_system(jacobian: &Array2<f64>, f: &Array1<f64>) -> Result<Array1<f64>, ColorError> {
    let n = jacobian.nrows();
    let m = jacobian.ncols();
    let j_mat = DMatrix::from_row_iterator(n, m, jacobian.iter().copied());
    let f_vec = DVector::from_iterator(n, f.iter().copied());

    if let Some(solution) = j_mat.clone().lu().solve(&f_vec) {
        return Ok(Array1::from_iter(solution.iter().copied()));
    }

    // Singular Jacobian: least-squares step through the pseudo-inverse
    let svd = j_mat.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| ColorError::SpectralSolve("SVD failed to compute U".into()))?;
    let vt = svd
        .v_t
        .ok_or_else(|| ColorError::SpectralSolve("SVD failed to compute V^T".into()))?;
    let s_inv = svd
        .singular_values
        .map(|x| if x.abs() > 1e-10 { 1.0 / x } else { 0.0 });

    let solution = vt.transpose() * s_inv.component_mul(&(u.transpose() * f_vec));
    Ok(Array1::from_iter(solution.iter().copied()))
}

/// Reflectance to linear sRGB matrix
///
/// CIE 1964 10-degree color matching functions, 36 wavelengths from 380nm
/// to 730nm, converted from XYZ to linear sRGB. Each row is scaled so that
/// a perfect reflector (all ones) maps exactly to linear white.
pub fn default_t_matrix() -> Array2<f64> {
    let x_bar = [
        0.000160, 0.002362, 0.019110, 0.084736, 0.204492, 0.314679, 0.383734, 0.370702, 0.302273,
        0.195618, 0.080507, 0.016172, 0.003816, 0.037465, 0.117749, 0.236491, 0.376772, 0.529826,
        0.705224, 0.878655, 1.014160, 1.118520, 1.123990, 1.030480, 0.856297, 0.647467, 0.431567,
        0.268329, 0.152568, 0.081261, 0.040851, 0.019941, 0.009577, 0.004539, 0.002175, 0.001060,
    ];
    let y_bar = [
        0.000017, 0.000253, 0.002004, 0.008756, 0.021391, 0.038676, 0.062077, 0.089456, 0.128201,
        0.185190, 0.253589, 0.339133, 0.460777, 0.606741, 0.761757, 0.875211, 0.961988, 0.991761,
        0.997340, 0.955552, 0.868934, 0.777405, 0.658341, 0.527963, 0.398057, 0.283493, 0.179828,
        0.107633, 0.060281, 0.031800, 0.015905, 0.007749, 0.003718, 0.001762, 0.000846, 0.000415,
    ];
    let z_bar = [
        0.000705, 0.010482, 0.086011, 0.389366, 0.972542, 1.553480, 1.967280, 1.994800, 1.745370,
        1.317560, 0.772125, 0.415254, 0.218502, 0.112044, 0.060709, 0.030451, 0.013676, 0.003988,
        0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000,
        0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000, 0.000000,
    ];
    // XYZ (D65) to linear sRGB
    let xyz_to_rgb = [
        [3.2404542, -1.5371385, -0.4985314],
        [-0.9692660, 1.8760108, 0.0415560],
        [0.0556434, -0.2040259, 1.0572252],
    ];

    let y_sum: f64 = y_bar.iter().sum();
    let mut t_matrix = Array2::zeros((3, BANDS));
    for (row, coefficients) in xyz_to_rgb.iter().enumerate() {
        for i in 0..BANDS {
            t_matrix[[row, i]] = (coefficients[0] * x_bar[i]
                + coefficients[1] * y_bar[i]
                + coefficients[2] * z_bar[i])
                / y_sum;
        }
        let row_sum = t_matrix.row(row).sum();
        t_matrix.row_mut(row).mapv_inplace(|v| v / row_sum);
    }
    t_matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn linear(rgb: Rgb) -> [f64; 3] {
        let c = rgb.channels();
        [srgb_to_linear(c[0]), srgb_to_linear(c[1]), srgb_to_linear(c[2])]
    }

    #[test]
    fn perfect_reflector_is_white() {
        let lhtss = Lhtss::default();
        let rgb = lhtss.reflectance_to_linear_rgb(&Array1::ones(BANDS));
        for c in rgb {
            assert_abs_diff_eq!(c, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn special_cases() {
        let lhtss = Lhtss::default();
        let black = lhtss.reflectance(Rgb::new(0, 0, 0)).unwrap();
        assert!(black.iter().all(|&r| r == BLACK_REFLECTANCE));
        let white = lhtss.reflectance(Rgb::new(255, 255, 255)).unwrap();
        assert!(white.iter().all(|&r| r == 1.0));
    }

    #[test]
    fn grey_is_flat() {
        let lhtss = Lhtss::default();
        let grey = Rgb::new(128, 128, 128);
        let rho = lhtss.reflectance(grey).unwrap();
        let expected = srgb_to_linear(128);
        for r in rho.iter() {
            assert_abs_diff_eq!(*r, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn reconstructs_in_gamut_colors() {
        let lhtss = Lhtss::default();
        for rgb in [
            Rgb::new(0, 255, 0),
            Rgb::new(0, 0, 255),
            Rgb::new(255, 255, 0),
            Rgb::new(200, 30, 40),
            Rgb::new(10, 200, 30),
            Rgb::new(1, 2, 3),
        ] {
            let rho = lhtss.reflectance(rgb).unwrap();
            assert!(rho.iter().all(|&r| r > 0.0 && r < 1.0), "{rgb}");
            let got = lhtss.reflectance_to_linear_rgb(&rho);
            // Targets are held 1e-4 inside the unit cube
            for (g, e) in got.iter().zip(linear(rgb)) {
                assert_abs_diff_eq!(*g, e, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn saturated_primaries_still_produce_a_curve() {
        let lhtss = Lhtss::default();
        for rgb in [Rgb::new(255, 0, 0), Rgb::new(0, 255, 255)] {
            let rho = lhtss.reflectance(rgb).unwrap();
            let got = lhtss.reflectance_to_linear_rgb(&rho);
            for (g, e) in got.iter().zip(linear(rgb)) {
                assert_abs_diff_eq!(*g, e, epsilon = 0.05);
            }
        }
    }
}
