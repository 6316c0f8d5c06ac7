// Gerbi - A multi-language page CMS built with Rust
// Copyright (C) 2025 Gerbi Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Per-page memo of current content values.
//!
//! An entry holds every current value of one page across all languages and
//! content types, so a page is read from the database at most once between
//! two invalidations. Entries are only dropped by an explicit
//! [`PageCache::invalidate`], [`PageCache::forget`] or [`PageCache::clear`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Current values of one page, keyed by `(language, content_type)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContents {
    values: HashMap<(String, String), String>,
}

impl PageContents {
    /// Build from revisions ordered oldest first; later revisions win.
    pub fn from_revisions<I>(revisions: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut values = HashMap::new();
        for (language, content_type, body) in revisions {
            values.insert((language, content_type), body);
        }
        Self { values }
    }

    pub fn get(&self, language: &str, content_type: &str) -> Option<&str> {
        self.values
            .get(&(language.to_string(), content_type.to_string()))
            .map(String::as_str)
    }

    /// Languages that hold at least one value for this page, sorted.
    pub fn languages(&self) -> Vec<String> {
        self.values
            .keys()
            .map(|(language, _)| language.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every value of one content type, by language.
    pub fn values_of<'a>(&'a self, content_type: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.values
            .iter()
            .filter(move |((_, t), _)| t == content_type)
            .map(|((language, _), body)| (language.as_str(), body.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<i64, Arc<PageContents>>,
    /// Only pages invalidated since the last `clear`; others sit at `floor`.
    generations: HashMap<i64, u64>,
    floor: u64,
}

impl CacheState {
    fn generation(&self, page_id: i64) -> u64 {
        self.generations.get(&page_id).copied().unwrap_or(self.floor)
    }

    /// Move the floor past every token handed out so far.
    fn raise_floor(&mut self) {
        let highest = self.generations.values().copied().max().unwrap_or(0);
        self.floor = self.floor.max(highest) + 1;
    }
}

/// Shared, clonable handle on the page content cache.
#[derive(Debug, Clone, Default)]
pub struct PageCache {
    state: Arc<RwLock<CacheState>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        // A panic while holding the lock leaves plain maps behind, still usable.
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, page_id: i64) -> Option<Arc<PageContents>> {
        self.read().entries.get(&page_id).cloned()
    }

    /// Token to hand back to [`PageCache::store`] after loading a page.
    pub fn generation(&self, page_id: i64) -> u64 {
        self.read().generation(page_id)
    }

    /// Store freshly loaded contents unless the page was invalidated since
    /// `generation` was taken. Returns whether the entry was stored.
    pub fn store(&self, page_id: i64, generation: u64, contents: Arc<PageContents>) -> bool {
        let mut state = self.write();
        if state.generation(page_id) != generation {
            tracing::debug!(page_id, "Discarding stale page cache fill");
            return false;
        }
        state.entries.insert(page_id, contents);
        true
    }

    /// Drop everything cached for a page, in every language.
    pub fn invalidate(&self, page_id: i64) {
        let mut state = self.write();
        state.entries.remove(&page_id);
        let next = state.generation(page_id) + 1;
        state.generations.insert(page_id, next);
        tracing::debug!(page_id, "Page cache invalidated");
    }

    /// Drop a deleted page for good, its generation counter included.
    pub fn forget(&self, page_id: i64) {
        let mut state = self.write();
        state.entries.remove(&page_id);
        if let Some(last) = state.generations.remove(&page_id) {
            // The page now reads the floor, which must not match an old token.
            state.floor = state.floor.max(last) + 1;
        } else {
            state.floor += 1;
        }
        tracing::debug!(page_id, "Page dropped from cache");
    }

    /// Drop every entry. Fills still in flight are discarded too.
    pub fn clear(&self) {
        let mut state = self.write();
        state.entries.clear();
        state.raise_floor();
        state.generations.clear();
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
