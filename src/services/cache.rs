//! Bounded caches for prepared palettes and suggestions
//!
//! Both evict the least recently *inserted* entry once full. Reads do not
//! refresh an entry.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use crate::models::{Paint, RecipeSuggestion, Rgb, SuggestOptions};

pub const DEFAULT_SUGGESTION_CAPACITY: usize = 250;
pub const DEFAULT_PALETTE_CAPACITY: usize = 8;

/// Fixed-capacity map with insertion-order eviction
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity + 1),
            order: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Insert or overwrite. Overwriting keeps the key's original position.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Identity of a palette's contents as far as the search can tell
///
/// Labels do not affect results, so two palettes with the same colors and
/// recipe markers share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaletteKey(Vec<(Rgb, bool)>);

impl PaletteKey {
    pub fn of(paints: &[Paint]) -> Self {
        Self(paints.iter().map(|p| (p.rgb, p.is_recipe())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuggestionKey {
    pub palette: PaletteKey,
    pub options: SuggestOptions,
    pub target: Rgb,
}

impl SuggestionKey {
    /// Options are normalized so that equivalent queries share an entry
    pub fn new(palette: PaletteKey, options: SuggestOptions, target: Rgb) -> Self {
        Self {
            palette,
            options: options.normalized(),
            target,
        }
    }
}

/// Caller-owned memo of search results, including "no suggestion"
pub type SuggestionCache = BoundedCache<SuggestionKey, Option<RecipeSuggestion>>;

impl Default for SuggestionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SUGGESTION_CAPACITY)
    }
}
