//! Paint recipe search
//!
//! Given a palette of base paints and a target color, find the mixture of
//! up to three paints, in small integer parts, whose color comes closest to
//! the target. Paints are mixed in a spectral Kubelka-Munk model and
//! compared with the CIE94 color difference.
//!
//! ```no_run
//! use paint_recipe::{Paint, PaintMixingService, Rgb, SuggestOptions};
//!
//! let service: PaintMixingService = PaintMixingService::default();
//! let palette = service.prepare_palette(&[
//!     Paint::new("Titanium White", Rgb::new(250, 250, 245)),
//!     Paint::new("Ultramarine", Rgb::new(18, 10, 143)),
//! ]);
//! if let Some(recipe) = service.suggest(&palette, Rgb::new(120, 130, 200), &SuggestOptions::default()) {
//!     println!("{} ({:.0}% match)", recipe.describe(palette.paints()), recipe.match_pct);
//! }
//! ```

pub mod config;
pub mod models;
pub mod services;

#[cfg(feature = "dispatch")]
pub mod state;

// Re-export for convenience
pub use models::{
    BasePalette, ColorError, Ingredient, Lab, Paint, RecipeSuggestion, Rgb, SuggestOptions,
    Superseded,
};
pub use services::cache::SuggestionCache;
pub use services::paint_mixing::{suggest_recipe, PaintMixingService, PreparedPalette, SearchPolicy};
pub use services::pigment::{KubelkaMunkModel, Latent, PigmentModel};
