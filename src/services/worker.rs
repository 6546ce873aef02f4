//! Batch recipe worker
//!
//! Answers "one palette, many target colors" requests. Prepared palettes and
//! individual suggestions are cached across requests; cache misses within a
//! batch are searched in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Paint, RecipeSuggestion, Rgb, SuggestOptions, Superseded};
use crate::services::cache::{
    BoundedCache, PaletteKey, SuggestionCache, SuggestionKey, DEFAULT_PALETTE_CAPACITY,
    DEFAULT_SUGGESTION_CAPACITY,
};
use crate::services::paint_mixing::{PaintMixingService, PreparedPalette};
use crate::services::pigment::{KubelkaMunkModel, PigmentModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub id: u64,
    pub palette: Vec<Paint>,
    pub colors: Vec<Rgb>,
    #[serde(default)]
    pub options: SuggestOptions,
}

/// Suggestions in the same order as the request's colors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub id: u64,
    pub suggestions: Vec<Option<RecipeSuggestion>>,
}

pub struct RecipeWorker<M = KubelkaMunkModel> {
    service: Arc<PaintMixingService<M>>,
    palettes: BoundedCache<PaletteKey, Arc<PreparedPalette>>,
    suggestions: SuggestionCache,
}

impl<M: PigmentModel> RecipeWorker<M> {
    pub fn new(service: Arc<PaintMixingService<M>>) -> Self {
        Self::with_capacities(service, DEFAULT_PALETTE_CAPACITY, DEFAULT_SUGGESTION_CAPACITY)
    }

    pub fn with_capacities(
        service: Arc<PaintMixingService<M>>,
        palette_capacity: usize,
        suggestion_capacity: usize,
    ) -> Self {
        Self {
            service,
            palettes: BoundedCache::new(palette_capacity),
            suggestions: SuggestionCache::new(suggestion_capacity),
        }
    }

    pub fn service(&self) -> &Arc<PaintMixingService<M>> {
        &self.service
    }

    pub fn cached_palettes(&self) -> usize {
        self.palettes.len()
    }

    pub fn cached_suggestions(&self) -> usize {
        self.suggestions.len()
    }

    /// Prepared form of `palette`, reused while it stays in the cache.
    ///
    /// Palettes are matched by colors and recipe markers only, so a cached
    /// entry may carry the labels of an earlier, otherwise identical palette.
    pub fn prepared(&mut self, palette: &[Paint]) -> Arc<PreparedPalette> {
        let key = PaletteKey::of(palette);
        if let Some(prepared) = self.palettes.get(&key) {
            return Arc::clone(prepared);
        }
        let prepared = Arc::new(self.service.prepare_palette(palette));
        self.palettes.insert(key, Arc::clone(&prepared));
        prepared
    }

    pub fn handle(&mut self, request: &BatchRequest) -> BatchResponse {
        match self.handle_while(request, || true) {
            Ok(response) => response,
            Err(Superseded) => BatchResponse {
                id: request.id,
                suggestions: vec![None; request.colors.len()],
            },
        }
    }

    /// [`handle`](Self::handle) that abandons the batch once `is_current`
    /// returns false. Nothing from an abandoned batch is cached.
    pub fn handle_while<F>(
        &mut self,
        request: &BatchRequest,
        is_current: F,
    ) -> Result<BatchResponse, Superseded>
    where
        F: Fn() -> bool + Sync,
    {
        if !is_current() {
            return Err(Superseded);
        }
        let prepared = self.prepared(&request.palette);
        let options = request.options;

        let keys: Vec<SuggestionKey> = request
            .colors
            .iter()
            .map(|&color| SuggestionKey::new(prepared.key().clone(), options, color))
            .collect();

        // Look up hits before inserting anything: a batch larger than the
        // cache would otherwise evict its own results.
        let mut results: Vec<Option<Option<RecipeSuggestion>>> =
            keys.iter().map(|key| self.suggestions.get(key).cloned()).collect();

        let mut misses: Vec<Rgb> = Vec::new();
        for (key, result) in keys.iter().zip(&results) {
            if result.is_none() && !misses.contains(&key.target) {
                misses.push(key.target);
            }
        }

        let service = &self.service;
        let computed: Vec<(Rgb, Option<RecipeSuggestion>)> = misses
            .par_iter()
            .map(|&target| {
                service
                    .suggest_while(&prepared, target, &options, &is_current)
                    .map(|suggestion| (target, suggestion))
            })
            .collect::<Result<Vec<_>, Superseded>>()?;

        debug!(
            id = request.id,
            targets = request.colors.len(),
            hits = request.colors.len() - results.iter().filter(|r| r.is_none()).count(),
            searched = computed.len(),
            "recipe batch"
        );

        let fresh: HashMap<Rgb, Option<RecipeSuggestion>> = computed.iter().cloned().collect();
        for (key, result) in keys.iter().zip(results.iter_mut()) {
            if result.is_none() {
                *result = fresh.get(&key.target).cloned();
            }
        }

        for (target, suggestion) in computed {
            self.suggestions
                .insert(SuggestionKey::new(prepared.key().clone(), options, target), suggestion);
        }

        Ok(BatchResponse {
            id: request.id,
            suggestions: results.into_iter().map(Option::flatten).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Arc<PaintMixingService> {
        Arc::new(PaintMixingService::default())
    }

    fn request(id: u64, colors: Vec<Rgb>) -> BatchRequest {
        BatchRequest {
            id,
            palette: vec![
                Paint::new("White", Rgb::new(255, 255, 255)),
                Paint::new("Black", Rgb::new(0, 0, 0)),
                Paint::new("Red", Rgb::new(220, 30, 30)),
            ],
            colors,
            options: SuggestOptions::default(),
        }
    }

    #[test]
    fn answers_in_request_order() {
        let mut worker = RecipeWorker::new(service());
        let colors = vec![Rgb::new(255, 255, 255), Rgb::new(220, 30, 30), Rgb::new(0, 0, 0)];
        let response = worker.handle(&request(7, colors));
        assert_eq!(response.id, 7);
        let firsts: Vec<usize> = response
            .suggestions
            .iter()
            .map(|s| s.as_ref().unwrap().ingredients[0].index)
            .collect();
        assert_eq!(firsts, vec![0, 2, 1]);
    }

    #[test]
    fn matches_direct_search_and_reuses_cache() {
        let service = service();
        let mut worker = RecipeWorker::new(Arc::clone(&service));
        let colors = vec![Rgb::new(200, 120, 120), Rgb::new(90, 90, 90), Rgb::new(200, 120, 120)];
        let req = request(1, colors.clone());

        let first = worker.handle(&req);
        assert_eq!(worker.cached_palettes(), 1);
        assert_eq!(worker.cached_suggestions(), 2);

        let prepared = service.prepare_palette(&req.palette);
        for (color, suggestion) in colors.iter().zip(&first.suggestions) {
            assert_eq!(
                suggestion,
                &service.suggest(&prepared, *color, &SuggestOptions::default())
            );
        }

        let second = worker.handle(&BatchRequest { id: 2, ..req });
        assert_eq!(second.suggestions, first.suggestions);
        assert_eq!(worker.cached_suggestions(), 2);
    }

    #[test]
    fn batch_larger_than_cache_is_complete() {
        let mut worker = RecipeWorker::with_capacities(service(), 1, 1);
        let colors: Vec<Rgb> = (0..4u8).map(|i| Rgb::new(i * 60, 40, 40)).collect();
        let response = worker.handle(&request(3, colors));
        assert_eq!(response.suggestions.len(), 4);
        assert!(response.suggestions.iter().all(Option::is_some));
        assert_eq!(worker.cached_suggestions(), 1);
    }

    #[test]
    fn empty_palette_yields_no_suggestions() {
        let mut worker = RecipeWorker::new(service());
        let response = worker.handle(&BatchRequest {
            id: 9,
            palette: vec![],
            colors: vec![Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)],
            options: SuggestOptions::default(),
        });
        assert_eq!(response.suggestions, vec![None, None]);
    }

    #[test]
    fn superseded_batch_is_abandoned_uncached() {
        let mut worker = RecipeWorker::new(service());
        let req = request(4, vec![Rgb::new(200, 120, 120), Rgb::new(90, 90, 90)]);

        assert_eq!(worker.handle_while(&req, || false), Err(Superseded));
        assert_eq!(worker.cached_palettes(), 0);
        assert_eq!(worker.cached_suggestions(), 0);

        let response = worker.handle_while(&req, || true).unwrap();
        assert_eq!(response, worker.handle(&req));
    }

    #[test]
    fn palette_cache_is_bounded() {
        let mut worker = RecipeWorker::with_capacities(service(), 2, 10);
        for shade in [10u8, 20, 30] {
            worker.prepared(&[Paint::new("Grey", Rgb::new(shade, shade, shade))]);
        }
        assert_eq!(worker.cached_palettes(), 2);
    }
}
