//! Per-record render-state cache
//!
//! [`RenderStateCache`] mirrors an externally-owned, ordered record
//! collection and tracks the derived state each record needs at render time:
//! its category index, selection bit, visibility bit, and chunk number.
//! Record keys come from the owning collection; the cache never stores the
//! records themselves.
//!
//! Consistency model: every mutation bumps a monotonically increasing
//! generation counter, and the filtered record count is cached against the
//! generation it was computed at. A count whose stamp matches the current
//! generation is served from cache; anything else triggers one linear scan.
//! Structural changes in the owning collection are pushed in with
//! [`RenderStateCache::rebuild`].
//!
//! The cache is not thread-safe; it expects the single-writer discipline of
//! the render loop that owns it.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::scheme::{Category, Scheme};
use crate::{Result, ThematicError};

/// Default number of records per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Derived render state for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordState {
    /// Index into the active scheme's category list
    pub category: usize,
    /// Whether the record is in the current selection
    pub selected: bool,
    /// Whether the record is drawn at all
    pub visible: bool,
    /// Which rendering chunk the record belongs to
    pub chunk: usize,
}

/// The filter a [`RenderStateCache::count`] scan applies.
///
/// Each `use_*` toggle enables one criterion; a record is counted when every
/// enabled criterion matches. With no toggles enabled the count is the full
/// record count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountFilter {
    pub use_selection: bool,
    pub selected: bool,
    pub use_category: bool,
    pub category: usize,
    pub use_visibility: bool,
    pub visible: bool,
    pub use_chunks: bool,
    pub chunk: usize,
}

impl CountFilter {
    fn matches(&self, state: &RecordState) -> bool {
        if self.use_selection && state.selected != self.selected {
            return false;
        }
        if self.use_category && state.category != self.category {
            return false;
        }
        if self.use_visibility && state.visible != self.visible {
            return false;
        }
        if self.use_chunks && state.chunk != self.chunk {
            return false;
        }
        true
    }
}

/// Render-state cache keyed by record identity.
///
/// `K` is whatever uniquely identifies a record in the owning collection
/// (an id, a handle). Keys must be unique; [`RenderStateCache::rebuild`]
/// rejects collections that violate this.
#[derive(Debug, Clone)]
pub struct RenderStateCache<K: Eq + Hash + Clone> {
    /// Materialized per-record states; records never touched since the last
    /// rebuild have no entry and read as the default state
    states: HashMap<K, RecordState>,
    /// Keys in the owning collection's order
    order: Vec<K>,
    /// Key to position lookup, kept in sync with `order`
    positions: HashMap<K, usize>,
    chunk_size: usize,
    filter: CountFilter,
    suspend_depth: u32,
    /// Bumped on every mutation; stamps the count cache
    generation: u64,
    /// Chunk re-indexing requested while suspended
    chunks_stale: bool,
    cached_count: Option<(u64, usize)>,
}

impl<K: Eq + Hash + Clone> Default for RenderStateCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> RenderStateCache<K> {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            states: HashMap::new(),
            order: Vec::new(),
            positions: HashMap::new(),
            chunk_size: chunk_size.max(1),
            filter: CountFilter::default(),
            suspend_depth: 0,
            generation: 0,
            chunks_stale: false,
            cached_count: None,
        }
    }

    /// Replace the tracked record set with the owning collection's current
    /// keys, in order. All derived state resets to defaults.
    ///
    /// Fails with [`ThematicError::DuplicateRecordKey`] if two keys compare
    /// equal; the cache is left unchanged in that case.
    pub fn rebuild<I>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
    {
        let mut order = Vec::new();
        let mut positions = HashMap::new();
        for (position, key) in keys.into_iter().enumerate() {
            if positions.insert(key.clone(), position).is_some() {
                return Err(ThematicError::DuplicateRecordKey { position });
            }
            order.push(key);
        }
        debug!("render-state cache rebuilt with {} records", order.len());
        self.order = order;
        self.positions = positions;
        self.states.clear();
        self.touch();
        Ok(())
    }

    /// Forget any cached derived values; the next `count` rescans.
    pub fn invalidate(&mut self) {
        self.touch();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    /// The record's current state, or `None` for an untracked key. Records
    /// never mutated since the last rebuild read as the default state.
    pub fn state(&self, key: &K) -> Option<RecordState> {
        let position = *self.positions.get(key)?;
        Some(
            self.states
                .get(key)
                .copied()
                .unwrap_or_else(|| self.default_state(position)),
        )
    }

    /// The state of the record at `index` in collection order.
    pub fn state_at(&self, index: usize) -> Option<RecordState> {
        self.state(self.order.get(index)?)
    }

    /// Recompute every record's category from `scheme`.
    ///
    /// `matches` evaluates a category's filter against a record (the caller
    /// owns attribute access). Categories apply in scheme order, so when a
    /// record matches more than one category the last match wins.
    pub fn apply_scheme<F>(&mut self, scheme: &Scheme, matches: F)
    where
        F: Fn(&K, &Category) -> bool,
    {
        for position in 0..self.order.len() {
            self.ensure_state(position).category = 0;
        }
        for (index, category) in scheme.categories.iter().enumerate() {
            for position in 0..self.order.len() {
                let key = self.order[position].clone();
                if matches(&key, category) {
                    self.ensure_state(position).category = index;
                }
            }
        }
        self.touch();
    }

    /// Add the record to the selection. `false` for an untracked key.
    pub fn select(&mut self, key: &K) -> bool {
        self.set_selected(key, true)
    }

    /// Remove the record from the selection. `false` for an untracked key.
    pub fn deselect(&mut self, key: &K) -> bool {
        self.set_selected(key, false)
    }

    fn set_selected(&mut self, key: &K, selected: bool) -> bool {
        let Some(&position) = self.positions.get(key) else {
            return false;
        };
        self.ensure_state(position).selected = selected;
        self.touch();
        true
    }

    pub fn select_all(&mut self) {
        for position in 0..self.order.len() {
            self.ensure_state(position).selected = true;
        }
        self.touch();
    }

    pub fn clear_selection(&mut self) {
        for position in 0..self.order.len() {
            self.ensure_state(position).selected = false;
        }
        self.touch();
    }

    /// Show or hide the record. `false` for an untracked key.
    pub fn set_visible(&mut self, key: &K, visible: bool) -> bool {
        let Some(&position) = self.positions.get(key) else {
            return false;
        };
        self.ensure_state(position).visible = visible;
        self.touch();
        true
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Change the chunk size and re-index every record's chunk. While
    /// suspended the re-indexing is deferred to the final resume.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
        if self.suspend_depth > 0 {
            self.chunks_stale = true;
        } else {
            self.rechunk();
        }
        self.touch();
    }

    /// Begin a batch of changes. Calls nest: the cache stays suspended until
    /// every `suspend_changes` has been matched by a `resume_changes`.
    pub fn suspend_changes(&mut self) {
        self.suspend_depth += 1;
    }

    pub fn resume_changes(&mut self) {
        self.suspend_depth = self.suspend_depth.saturating_sub(1);
        if self.suspend_depth == 0 && self.chunks_stale {
            self.rechunk();
            self.chunks_stale = false;
            self.touch();
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    pub fn filter(&self) -> CountFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: CountFilter) {
        self.filter = filter;
        self.touch();
    }

    /// Number of records matching the active filter.
    ///
    /// Served from cache when nothing has changed since the last scan;
    /// otherwise one linear pass over the record set.
    pub fn count(&mut self) -> usize {
        if let Some((stamp, count)) = self.cached_count {
            if stamp == self.generation {
                return count;
            }
        }
        let count = self.scan_count();
        self.cached_count = Some((self.generation, count));
        count
    }

    fn scan_count(&self) -> usize {
        self.order
            .iter()
            .enumerate()
            .filter(|(position, key)| {
                let state = self
                    .states
                    .get(key)
                    .copied()
                    .unwrap_or_else(|| self.default_state(*position));
                self.filter.matches(&state)
            })
            .count()
    }

    fn default_state(&self, position: usize) -> RecordState {
        RecordState {
            category: 0,
            selected: false,
            visible: true,
            chunk: position / self.chunk_size,
        }
    }

    fn ensure_state(&mut self, position: usize) -> &mut RecordState {
        let key = self.order[position].clone();
        let default = self.default_state(position);
        self.states.entry(key).or_insert(default)
    }

    fn rechunk(&mut self) {
        for position in 0..self.order.len() {
            self.ensure_state(position).chunk = position / self.chunk_size;
        }
    }

    fn touch(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::scheme::ClassificationMethod;

    fn keyed(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    // =========================================================================
    // Rebuild Tests
    // =========================================================================

    #[test]
    fn test_rebuild_tracks_keys_in_order() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(vec![7, 3, 9]).unwrap();
        assert_eq!(cache.len(), 3);
        assert!(cache.contains_key(&3));
        assert_eq!(cache.state_at(0), cache.state(&7));
    }

    #[test]
    fn test_rebuild_rejects_duplicate_keys() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        assert!(matches!(
            cache.rebuild(vec![1, 2, 1]),
            Err(ThematicError::DuplicateRecordKey { position: 2 })
        ));
    }

    #[test]
    fn test_failed_rebuild_leaves_cache_unchanged() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(vec![1, 2, 3]).unwrap();
        cache.select(&2);
        assert!(cache.rebuild(vec![4, 4]).is_err());
        assert_eq!(cache.len(), 3);
        assert!(cache.state(&2).unwrap().selected);
    }

    #[test]
    fn test_untouched_records_read_as_defaults() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::with_chunk_size(2);
        cache.rebuild(keyed(5)).unwrap();
        let state = cache.state(&4).unwrap();
        assert_eq!(state.category, 0);
        assert!(!state.selected);
        assert!(state.visible);
        assert_eq!(state.chunk, 2);
        assert_eq!(cache.state(&99), None);
    }

    // =========================================================================
    // Scheme Application Tests
    // =========================================================================

    fn two_overlapping_categories() -> Scheme {
        let mut scheme = Scheme::new(ClassificationMethod::EqualInterval);
        scheme.categories = vec![
            Category::new(Range::bounded(0.0, 10.0), 0),
            Category::new(Range::bounded(5.0, 10.0), 1),
        ];
        scheme
    }

    #[test]
    fn test_apply_scheme_last_match_wins() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(vec![3, 7]).unwrap();
        let scheme = two_overlapping_categories();
        cache.apply_scheme(&scheme, |key, category| category.contains(f64::from(*key)));

        // 3 matches only the first category, 7 matches both
        assert_eq!(cache.state(&3).unwrap().category, 0);
        assert_eq!(cache.state(&7).unwrap().category, 1);
    }

    #[test]
    fn test_apply_scheme_resets_previous_categories() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(vec![7]).unwrap();
        let scheme = two_overlapping_categories();
        cache.apply_scheme(&scheme, |key, category| category.contains(f64::from(*key)));
        assert_eq!(cache.state(&7).unwrap().category, 1);

        // a scheme matching nothing leaves every record at category 0
        let empty = Scheme::new(ClassificationMethod::EqualInterval);
        cache.apply_scheme(&empty, |_, _| false);
        assert_eq!(cache.state(&7).unwrap().category, 0);
    }

    // =========================================================================
    // Count Tests
    // =========================================================================

    #[test]
    fn test_count_unfiltered_is_record_count() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(keyed(10)).unwrap();
        assert_eq!(cache.count(), 10);
    }

    #[test]
    fn test_count_matches_brute_force_scan() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::with_chunk_size(4);
        cache.rebuild(keyed(10)).unwrap();
        for key in [1, 3, 5, 7] {
            cache.select(&key);
        }
        cache.set_visible(&5, false);

        let filter = CountFilter {
            use_selection: true,
            selected: true,
            use_visibility: true,
            visible: true,
            ..CountFilter::default()
        };
        cache.set_filter(filter);

        let expected = (0..10u32)
            .filter(|key| {
                let state = cache.state(key).unwrap();
                state.selected && state.visible
            })
            .count();
        assert_eq!(cache.count(), expected);
        assert_eq!(cache.count(), 3);
    }

    #[test]
    fn test_count_cache_invalidated_by_mutation() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(keyed(4)).unwrap();
        cache.set_filter(CountFilter {
            use_selection: true,
            selected: true,
            ..CountFilter::default()
        });
        assert_eq!(cache.count(), 0);
        cache.select(&2);
        assert_eq!(cache.count(), 1);
        cache.clear_selection();
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn test_count_survives_invalidate_and_rebuild() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(keyed(6)).unwrap();
        cache.select_all();
        cache.set_filter(CountFilter {
            use_selection: true,
            selected: true,
            ..CountFilter::default()
        });
        assert_eq!(cache.count(), 6);

        cache.invalidate();
        assert_eq!(cache.count(), 6);

        // a rebuild resets selection state
        cache.rebuild(keyed(6)).unwrap();
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn test_count_by_chunk() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::with_chunk_size(4);
        cache.rebuild(keyed(10)).unwrap();
        cache.set_filter(CountFilter {
            use_chunks: true,
            chunk: 2,
            ..CountFilter::default()
        });
        // chunks: 0..4 -> 0, 4..8 -> 1, 8..10 -> 2
        assert_eq!(cache.count(), 2);
    }

    // =========================================================================
    // Chunking / Suspension Tests
    // =========================================================================

    #[test]
    fn test_set_chunk_size_reindexes() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::with_chunk_size(2);
        cache.rebuild(keyed(5)).unwrap();
        cache.select(&4); // materialize a state under the old chunking
        assert_eq!(cache.state(&4).unwrap().chunk, 2);

        cache.set_chunk_size(5);
        for key in 0..5 {
            assert_eq!(cache.state(&key).unwrap().chunk, 0);
        }
    }

    #[test]
    fn test_suspend_defers_rechunk_until_fully_resumed() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::with_chunk_size(10);
        cache.rebuild(keyed(4)).unwrap();
        cache.select(&3); // materialized with chunk 0

        cache.suspend_changes();
        cache.suspend_changes();
        cache.set_chunk_size(1);
        assert_eq!(cache.state(&3).unwrap().chunk, 0);

        cache.resume_changes();
        assert!(cache.is_suspended());
        assert_eq!(cache.state(&3).unwrap().chunk, 0);

        cache.resume_changes();
        assert!(!cache.is_suspended());
        assert_eq!(cache.state(&3).unwrap().chunk, 3);
    }

    #[test]
    fn test_unbalanced_resume_is_harmless() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(keyed(2)).unwrap();
        cache.resume_changes();
        assert!(!cache.is_suspended());
        cache.suspend_changes();
        assert!(cache.is_suspended());
        cache.resume_changes();
        assert!(!cache.is_suspended());
    }

    // =========================================================================
    // Selection / Visibility Tests
    // =========================================================================

    #[test]
    fn test_select_deselect_round_trip() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(keyed(3)).unwrap();
        assert!(cache.select(&1));
        assert!(cache.state(&1).unwrap().selected);
        assert!(cache.deselect(&1));
        assert!(!cache.state(&1).unwrap().selected);
        assert!(!cache.select(&42));
        assert!(!cache.deselect(&42));
    }

    #[test]
    fn test_visibility_defaults_on_and_toggles() {
        let mut cache: RenderStateCache<u32> = RenderStateCache::new();
        cache.rebuild(keyed(2)).unwrap();
        assert!(cache.state(&0).unwrap().visible);
        assert!(cache.set_visible(&0, false));
        assert!(!cache.state(&0).unwrap().visible);
    }
}
