use serde::{Deserialize, Serialize};

use crate::models::Rgb;

/// Default maximum number of distinct paints in a recipe
pub const DEFAULT_MAX_COLORS: usize = 3;
/// Default upper bound on the summed part counts of a recipe
pub const DEFAULT_MAX_TOTAL_PARTS: u32 = 10;
/// Largest mixture the search enumerates
pub const MAX_ARITY: usize = 3;
/// Below this match percentage a suggestion is only the best available, not a good match
pub const LOW_MATCH_THRESHOLD: f64 = 60.0;

/// A paint on the user's palette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    pub label: String,
    pub rgb: Rgb,
    /// Set when this entry is a saved mixture rather than a tube of paint.
    /// Such entries are shown on the palette but never used as ingredients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Vec<Ingredient>>,
}

impl Paint {
    pub fn new(label: impl Into<String>, rgb: Rgb) -> Self {
        Self {
            label: label.into(),
            rgb,
            recipe: None,
        }
    }

    pub fn mixed(label: impl Into<String>, rgb: Rgb, recipe: Vec<Ingredient>) -> Self {
        Self {
            label: label.into(),
            rgb,
            recipe: Some(recipe),
        }
    }

    pub fn is_recipe(&self) -> bool {
        self.recipe.is_some()
    }
}

/// `parts` parts of the paint at `index` in the palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ingredient {
    pub index: usize,
    pub parts: u32,
}

impl Ingredient {
    pub const fn new(index: usize, parts: u32) -> Self {
        Self { index, parts }
    }
}

/// Result of a recipe search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSuggestion {
    pub ingredients: Vec<Ingredient>,
    pub result_rgb: Rgb,
    pub delta_e: f64,
    pub match_pct: f64,
}

impl RecipeSuggestion {
    pub fn total_parts(&self) -> u32 {
        self.ingredients.iter().map(|i| i.parts).sum()
    }

    pub fn is_low_match(&self, threshold: f64) -> bool {
        self.match_pct < threshold
    }

    /// Human readable ingredient list, e.g. `2 parts White + 1 part Black`.
    ///
    /// Indices are resolved against `palette`; an index the palette does not
    /// have is shown as `Paint N` (1-based).
    pub fn describe(&self, palette: &[Paint]) -> String {
        self.ingredients
            .iter()
            .map(|ingredient| {
                let label = palette
                    .get(ingredient.index)
                    .map(|p| p.label.clone())
                    .unwrap_or_else(|| format!("Paint {}", ingredient.index + 1));
                let unit = if ingredient.parts == 1 { "part" } else { "parts" };
                format!("{} {} {}", ingredient.parts, unit, label)
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Search limits for a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestOptions {
    pub max_colors: usize,
    pub max_total_parts: u32,
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            max_colors: DEFAULT_MAX_COLORS,
            max_total_parts: DEFAULT_MAX_TOTAL_PARTS,
        }
    }
}

impl SuggestOptions {
    pub fn new(max_colors: usize, max_total_parts: u32) -> Self {
        Self {
            max_colors,
            max_total_parts,
        }
    }

    /// Clamp out-of-range values instead of rejecting them.
    ///
    /// Two options that normalize to the same value produce the same search.
    pub fn normalized(self) -> Self {
        Self {
            max_colors: self.max_colors.min(MAX_ARITY),
            max_total_parts: self.max_total_parts.max(1),
        }
    }
}

/// Internal candidate representation during search
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub ingredients: Vec<Ingredient>,
    pub result_rgb: Rgb,
    pub delta_e: f64,
    pub match_pct: f64,
    pub total_parts: u32,
}

impl From<Candidate> for RecipeSuggestion {
    fn from(candidate: Candidate) -> Self {
        Self {
            ingredients: candidate.ingredients,
            result_rgb: candidate.result_rgb,
            delta_e: candidate.delta_e,
            match_pct: candidate.match_pct,
        }
    }
}

/// The mixable part of a display palette
///
/// Recipe entries are dropped; `display_index` maps a base index (as used
/// in suggestions built from [`BasePalette::paints`]) back to the position
/// on the full palette.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasePalette {
    paints: Vec<Paint>,
    display_indices: Vec<usize>,
}

impl BasePalette {
    pub fn from_paints(palette: &[Paint]) -> Self {
        let (display_indices, paints) = palette
            .iter()
            .enumerate()
            .filter(|(_, paint)| !paint.is_recipe())
            .map(|(index, paint)| (index, paint.clone()))
            .unzip();
        Self {
            paints,
            display_indices,
        }
    }

    pub fn paints(&self) -> &[Paint] {
        &self.paints
    }

    pub fn display_index(&self, base_index: usize) -> Option<usize> {
        self.display_indices.get(base_index).copied()
    }

    /// Rewrite a suggestion made against [`paints`](Self::paints) to index
    /// the full palette. `None` if it names a paint this palette lacks.
    pub fn to_display(&self, mut suggestion: RecipeSuggestion) -> Option<RecipeSuggestion> {
        for ingredient in &mut suggestion.ingredients {
            ingredient.index = self.display_index(ingredient.index)?;
        }
        Some(suggestion)
    }

    pub fn is_empty(&self) -> bool {
        self.paints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paints.len()
    }
}

/// Errors that can occur while parsing colors or configuring the search
#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("Invalid color: {0:?}")]
    InvalidColor(String),
    #[error("Spectral reconstruction failed: {0}")]
    SpectralSolve(String),
    #[error("Invalid value {value:?} for {key}")]
    InvalidSetting { key: String, value: String },
}

/// A search or batch abandoned because a newer request replaced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("superseded by a newer request")]
pub struct Superseded;

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Vec<Paint> {
        vec![
            Paint::new("White", Rgb::new(255, 255, 255)),
            Paint::mixed("Grey", Rgb::new(128, 128, 128), vec![Ingredient::new(0, 1), Ingredient::new(2, 1)]),
            Paint::new("Black", Rgb::new(0, 0, 0)),
        ]
    }

    #[test]
    fn describe_pluralizes_and_resolves_labels() {
        let suggestion = RecipeSuggestion {
            ingredients: vec![Ingredient::new(0, 2), Ingredient::new(2, 1), Ingredient::new(7, 3)],
            result_rgb: Rgb::new(90, 90, 90),
            delta_e: 4.0,
            match_pct: 96.0,
        };
        assert_eq!(
            suggestion.describe(&palette()),
            "2 parts White + 1 part Black + 3 parts Paint 8"
        );
        assert_eq!(suggestion.total_parts(), 6);
        assert!(!suggestion.is_low_match(LOW_MATCH_THRESHOLD));
    }

    #[test]
    fn base_palette_skips_recipes() {
        let base = BasePalette::from_paints(&palette());
        assert_eq!(base.len(), 2);
        assert_eq!(base.paints()[1].label, "Black");
        assert_eq!(base.display_index(0), Some(0));
        assert_eq!(base.display_index(1), Some(2));
        assert_eq!(base.display_index(2), None);
    }

    #[test]
    fn base_palette_maps_suggestions_to_display_indices() {
        let base = BasePalette::from_paints(&palette());
        let suggestion = RecipeSuggestion {
            ingredients: vec![Ingredient::new(0, 3), Ingredient::new(1, 1)],
            result_rgb: Rgb::new(190, 190, 190),
            delta_e: 1.0,
            match_pct: 99.0,
        };
        let shown = base.to_display(suggestion.clone()).unwrap();
        assert_eq!(shown.ingredients, vec![Ingredient::new(0, 3), Ingredient::new(2, 1)]);
        assert_eq!(shown.describe(&palette()), suggestion.describe(base.paints()));

        let stray = RecipeSuggestion {
            ingredients: vec![Ingredient::new(5, 1)],
            ..suggestion
        };
        assert!(base.to_display(stray).is_none());
    }

    #[test]
    fn options_normalize_out_of_range_values() {
        assert_eq!(SuggestOptions::new(9, 0).normalized(), SuggestOptions::new(3, 1));
        assert_eq!(SuggestOptions::new(0, 10).normalized(), SuggestOptions::new(0, 10));
        assert_eq!(SuggestOptions::default().normalized(), SuggestOptions::default());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SuggestOptions = serde_json::from_str(r#"{"max_colors": 2}"#).unwrap();
        assert_eq!(options, SuggestOptions::new(2, DEFAULT_MAX_TOTAL_PARTS));
    }

    #[test]
    fn paint_json_round_trip() {
        let json = r#"{"label":"Grey","rgb":"rgb(128, 128, 128)","recipe":[{"index":0,"parts":1}]}"#;
        let paint: Paint = serde_json::from_str(json).unwrap();
        assert!(paint.is_recipe());
        assert_eq!(serde_json::to_string(&paint).unwrap(), json);
    }
}
