//! Pigment mixing model
//!
//! Colors are mapped into a latent space where a part-weighted average of
//! the coordinates behaves like mixing the paints. The search engine only
//! sees the [`PigmentModel`] trait.

use ndarray::{s, Array1};
use tracing::debug;

use crate::models::{Ingredient, Rgb};
use crate::services::lhtss::{Lhtss, BANDS};
use crate::services::perceptual::{linear_to_rgb, srgb_to_linear};

/// A point in a model's latent pigment space
pub type Latent = Array1<f64>;

/// Conversion between colors and a latent space that mixes linearly
pub trait PigmentModel: Send + Sync {
    /// `None` when the color cannot be represented; such a paint never mixes.
    fn rgb_to_latent(&self, rgb: Rgb) -> Option<Latent>;

    fn latent_to_rgb(&self, latent: &Latent) -> Rgb;
}

/// Part-weighted sum of the ingredients' latents
///
/// Returns `None` for an empty mixture or when any ingredient has no latent.
pub fn mix_latents(ingredients: &[Ingredient], latents: &[Option<Latent>]) -> Option<Latent> {
    let total_parts: u32 = ingredients.iter().map(|i| i.parts).sum();
    if total_parts == 0 {
        return None;
    }

    let mut mixed: Option<Latent> = None;
    for ingredient in ingredients {
        let latent = latents.get(ingredient.index)?.as_ref()?;
        let weight = ingredient.parts as f64 / total_parts as f64;
        match mixed.as_mut() {
            Some(acc) => acc.scaled_add(weight, latent),
            None => mixed = Some(latent * weight),
        }
    }
    mixed
}

// Physical paints reflect between roughly 3% (ivory black) and 95%
// (titanium white). Reflectance curves are mapped into this range before
// the K/S transform so that neither end absorbs without limit.
const PAINT_REFLECTANCE_FLOOR: f64 = 0.03;
const PAINT_REFLECTANCE_CEILING: f64 = 0.95;

/// Convert reflectance R to Kubelka-Munk K/S ratio
/// Formula: K/S = (1 - R)² / (2R)
#[inline]
fn reflectance_to_ks(r: f64) -> f64 {
    let r = PAINT_REFLECTANCE_FLOOR
        + (PAINT_REFLECTANCE_CEILING - PAINT_REFLECTANCE_FLOOR) * r.clamp(0.0, 1.0);
    (1.0 - r).powi(2) / (2.0 * r)
}

/// Convert Kubelka-Munk K/S ratio back to reflectance R
/// Formula: R = 1 + K/S - √(K/S² + 2·K/S)
#[inline]
fn ks_to_reflectance(ks: f64) -> f64 {
    let r = if ks <= 0.0 {
        1.0
    } else {
        1.0 + ks - (ks * ks + 2.0 * ks).sqrt()
    };
    ((r - PAINT_REFLECTANCE_FLOOR) / (PAINT_REFLECTANCE_CEILING - PAINT_REFLECTANCE_FLOOR))
        .clamp(0.0, 1.0)
}

/// Spectral Kubelka-Munk mixing
///
/// The latent holds the K/S curve of the paint (36 bands) followed by a
/// linear RGB residual. K/S values of pigments add, so a weighted average of
/// the curves is the mixture's curve. The residual is whatever the spectral
/// round trip misses, which makes a single paint come back as exactly
/// itself.
#[derive(Clone, Default)]
pub struct KubelkaMunkModel {
    lhtss: Lhtss,
}

impl KubelkaMunkModel {
    pub fn new(lhtss: Lhtss) -> Self {
        Self { lhtss }
    }

    fn spectral_rgb(&self, ks: &Array1<f64>) -> [f64; 3] {
        let reflectance = ks.mapv(ks_to_reflectance);
        self.lhtss.reflectance_to_linear_rgb(&reflectance)
    }
}

impl PigmentModel for KubelkaMunkModel {
    fn rgb_to_latent(&self, rgb: Rgb) -> Option<Latent> {
        let reflectance = match self.lhtss.reflectance(rgb) {
            Ok(reflectance) => reflectance,
            Err(e) => {
                debug!(%rgb, error = %e, "paint excluded from mixing");
                return None;
            }
        };
        let ks = reflectance.mapv(reflectance_to_ks);
        let spectral = self.spectral_rgb(&ks);

        let mut latent = Array1::zeros(BANDS + 3);
        latent.slice_mut(s![..BANDS]).assign(&ks);
        for (k, channel) in rgb.channels().into_iter().enumerate() {
            latent[BANDS + k] = srgb_to_linear(channel) - spectral[k];
        }
        Some(latent)
    }

    fn latent_to_rgb(&self, latent: &Latent) -> Rgb {
        let ks = latent.slice(s![..BANDS]).to_owned();
        let spectral = self.spectral_rgb(&ks);
        linear_to_rgb([
            spectral[0] + latent[BANDS],
            spectral[1] + latent[BANDS + 1],
            spectral[2] + latent[BANDS + 2],
        ])
    }
}
