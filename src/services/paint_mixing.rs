//! Paint mixing service for finding the recipe that best matches a target color
//!
//! Mixtures of one, two and three paints are enumerated over integer part
//! ratios, mixed in the pigment model's latent space and scored with CIE94
//! against the target.

use tracing::{debug, trace};

use crate::models::{
    Candidate, Ingredient, Lab, Paint, RecipeSuggestion, Rgb, SuggestOptions, Superseded,
};
use crate::services::cache::{PaletteKey, SuggestionCache, SuggestionKey};
use crate::services::perceptual::{delta_e94, match_pct, rgb_to_lab};
use crate::services::pigment::{mix_latents, KubelkaMunkModel, Latent, PigmentModel};

/// Palettes larger than this are pruned before combining
pub const LARGE_PALETTE_THRESHOLD: usize = 25;
/// Number of perceptually closest paints kept after pruning
pub const MAX_CANDIDATE_PAINTS: usize = 12;
/// Differences closer than this are ties
pub const TIE_TOLERANCE: f64 = 1e-6;

/// Tunable constants of the search
///
/// Changing any of them changes which recipe is returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchPolicy {
    pub large_palette_threshold: usize,
    pub max_candidate_paints: usize,
    pub tie_tolerance: f64,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            large_palette_threshold: LARGE_PALETTE_THRESHOLD,
            max_candidate_paints: MAX_CANDIDATE_PAINTS,
            tie_tolerance: TIE_TOLERANCE,
        }
    }
}

/// A palette with every paint converted once for repeated searching
#[derive(Debug, Clone)]
pub struct PreparedPalette {
    paints: Vec<Paint>,
    labs: Vec<Lab>,
    latents: Vec<Option<Latent>>,
    key: PaletteKey,
}

impl PreparedPalette {
    pub fn len(&self) -> usize {
        self.paints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paints.is_empty()
    }

    pub fn paints(&self) -> &[Paint] {
        &self.paints
    }

    pub fn lab(&self, index: usize) -> Option<&Lab> {
        self.labs.get(index)
    }

    pub fn latent(&self, index: usize) -> Option<&Latent> {
        self.latents.get(index).and_then(Option::as_ref)
    }

    /// Number of paints that can take part in a mixture
    pub fn mixable_count(&self) -> usize {
        self.latents.iter().filter(|l| l.is_some()).count()
    }

    pub fn key(&self) -> &PaletteKey {
        &self.key
    }
}

/// Finds the best recipe for a target color from a prepared palette
#[derive(Clone, Default)]
pub struct PaintMixingService<M = KubelkaMunkModel> {
    model: M,
    policy: SearchPolicy,
}

impl<M: PigmentModel> PaintMixingService<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            policy: SearchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SearchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Convert every paint for searching. Never fails; paints the model
    /// cannot represent, and saved recipes, are kept but never mixed.
    pub fn prepare_palette(&self, paints: &[Paint]) -> PreparedPalette {
        let labs = paints.iter().map(|p| rgb_to_lab(p.rgb)).collect();
        let latents: Vec<Option<Latent>> = paints
            .iter()
            .map(|p| {
                if p.is_recipe() {
                    None
                } else {
                    self.model.rgb_to_latent(p.rgb)
                }
            })
            .collect();

        let prepared = PreparedPalette {
            paints: paints.to_vec(),
            labs,
            latents,
            key: PaletteKey::of(paints),
        };
        debug!(
            paints = prepared.len(),
            mixable = prepared.mixable_count(),
            "prepared palette"
        );
        prepared
    }

    /// Best recipe for `target`, or `None` when nothing on the palette can be mixed
    pub fn suggest(
        &self,
        prepared: &PreparedPalette,
        target: Rgb,
        options: &SuggestOptions,
    ) -> Option<RecipeSuggestion> {
        match self.suggest_while(prepared, target, options, || true) {
            Ok(suggestion) => suggestion,
            Err(Superseded) => None,
        }
    }

    /// [`suggest`](Self::suggest) that gives up once `is_current` returns false
    ///
    /// `is_current` is polled before each single paint and before each part
    /// total of every pair and triple.
    pub fn suggest_while<F>(
        &self,
        prepared: &PreparedPalette,
        target: Rgb,
        options: &SuggestOptions,
        is_current: F,
    ) -> Result<Option<RecipeSuggestion>, Superseded>
    where
        F: Fn() -> bool,
    {
        let check = || if is_current() { Ok(()) } else { Err(Superseded) };
        check()?;
        if prepared.is_empty() {
            return Ok(None);
        }

        let options = options.normalized();
        let max_colors = options.max_colors;
        let max_total_parts = options.max_total_parts;

        let target_lab = rgb_to_lab(target);
        let active: Vec<usize> = self
            .candidate_indices(&prepared.labs, &target_lab)
            .into_iter()
            .filter(|&index| prepared.latents[index].is_some())
            .collect();

        if active.is_empty() {
            return Ok(None);
        }

        let latents = &prepared.latents;
        let tolerance = self.policy.tie_tolerance;
        let mut best: Option<Candidate> = None;
        let mut evaluated = 0usize;

        let mut consider = |ingredients: Vec<Ingredient>| {
            if let Some(candidate) = self.evaluate(ingredients, latents, &target_lab) {
                evaluated += 1;
                best = Some(pick_best(best.take(), candidate, tolerance));
            }
        };

        if max_colors >= 1 {
            for &index in &active {
                check()?;
                consider(vec![Ingredient::new(index, 1)]);
            }
        }

        if max_colors >= 2 {
            for (a, &index_a) in active.iter().enumerate() {
                for &index_b in &active[a + 1..] {
                    for total_parts in 2..=max_total_parts {
                        check()?;
                        for parts_a in 1..total_parts {
                            consider(vec![
                                Ingredient::new(index_a, parts_a),
                                Ingredient::new(index_b, total_parts - parts_a),
                            ]);
                        }
                    }
                }
            }
        }

        if max_colors >= 3 {
            for (a, &index_a) in active.iter().enumerate() {
                for (b, &index_b) in active.iter().enumerate().skip(a + 1) {
                    for &index_c in &active[b + 1..] {
                        for total_parts in 3..=max_total_parts {
                            check()?;
                            for parts_a in 1..=total_parts - 2 {
                                for parts_b in 1..total_parts - parts_a {
                                    consider(vec![
                                        Ingredient::new(index_a, parts_a),
                                        Ingredient::new(index_b, parts_b),
                                        Ingredient::new(index_c, total_parts - parts_a - parts_b),
                                    ]);
                                }
                            }
                        }
                    }
                }
            }
        }

        let Some(best) = best else {
            return Ok(None);
        };
        debug!(
            %target,
            candidates = active.len(),
            evaluated,
            delta_e = best.delta_e,
            colors = best.ingredients.len(),
            "recipe search finished"
        );
        Ok(Some(best.into()))
    }

    /// [`suggest`](Self::suggest) memoized in a caller-owned cache
    pub fn suggest_cached(
        &self,
        prepared: &PreparedPalette,
        target: Rgb,
        options: &SuggestOptions,
        cache: &mut SuggestionCache,
    ) -> Option<RecipeSuggestion> {
        let key = SuggestionKey::new(prepared.key.clone(), *options, target);
        if let Some(hit) = cache.get(&key) {
            trace!(%target, "suggestion cache hit");
            return hit.clone();
        }
        let result = self.suggest(prepared, target, options);
        cache.insert(key, result.clone());
        result
    }

    /// Palette indices worth combining for this target
    fn candidate_indices(&self, labs: &[Lab], target_lab: &Lab) -> Vec<usize> {
        if labs.len() <= self.policy.large_palette_threshold {
            return (0..labs.len()).collect();
        }

        let mut ranked: Vec<(usize, f64)> = labs
            .iter()
            .enumerate()
            .map(|(index, lab)| (index, delta_e94(lab, target_lab)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(self.policy.max_candidate_paints)
            .map(|(index, _)| index)
            .collect()
    }

    fn evaluate(
        &self,
        ingredients: Vec<Ingredient>,
        latents: &[Option<Latent>],
        target_lab: &Lab,
    ) -> Option<Candidate> {
        let mixed = mix_latents(&ingredients, latents)?;
        let result_rgb = self.model.latent_to_rgb(&mixed);
        let delta_e = delta_e94(&rgb_to_lab(result_rgb), target_lab);
        let total_parts = ingredients.iter().map(|i| i.parts).sum();

        Some(Candidate {
            ingredients,
            result_rgb,
            delta_e,
            match_pct: match_pct(delta_e),
            total_parts,
        })
    }
}

/// Keep the better of the running best and a new candidate
///
/// Lower difference wins. Within `tolerance`, fewer paints win, then fewer
/// total parts; otherwise the earlier candidate stays.
pub(crate) fn pick_best(best: Option<Candidate>, candidate: Candidate, tolerance: f64) -> Candidate {
    let Some(best) = best else {
        return candidate;
    };

    let gap = candidate.delta_e - best.delta_e;
    if gap < -tolerance {
        return candidate;
    }

    if gap.abs() <= tolerance {
        if candidate.ingredients.len() < best.ingredients.len() {
            return candidate;
        }
        if candidate.ingredients.len() == best.ingredients.len()
            && candidate.total_parts < best.total_parts
        {
            return candidate;
        }
    }

    best
}

/// Prepare `paints` and search once with the default model
pub fn suggest_recipe(
    paints: &[Paint],
    target: Rgb,
    options: &SuggestOptions,
) -> Option<RecipeSuggestion> {
    if paints.is_empty() {
        return None;
    }
    let service = PaintMixingService::<KubelkaMunkModel>::default();
    let prepared = service.prepare_palette(paints);
    service.suggest(&prepared, target, options)
}
