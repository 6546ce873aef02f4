mod color;
mod paint;

pub use color::{Lab, Rgb};
pub(crate) use paint::Candidate;
pub use paint::{
    BasePalette, ColorError, Ingredient, Paint, RecipeSuggestion, SuggestOptions, Superseded,
    DEFAULT_MAX_COLORS, DEFAULT_MAX_TOTAL_PARTS, LOW_MATCH_THRESHOLD, MAX_ARITY,
};
