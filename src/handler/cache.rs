//! Per-session alias → entry map
//!
//! The cache owns its entries but never touches their cursors; callers close
//! an entry before removing it.

use std::collections::HashMap;

use super::entry::HandleEntry;
use super::errors::{HandlerError, HandlerResult};
use super::name::{alias_key, HandleName};

#[derive(Debug)]
pub struct HandleCache<C> {
    entries: HashMap<String, HandleEntry<C>>,
}

impl<C> Default for HandleCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> HandleCache<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a closed entry for `name`
    pub fn insert(&mut self, name: HandleName) -> HandlerResult<&mut HandleEntry<C>> {
        let key = name.alias_key();
        if self.entries.contains_key(&key) {
            return Err(HandlerError::duplicate_alias(name.alias()));
        }
        Ok(self.entries.entry(key).or_insert_with(|| HandleEntry::new(name)))
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(&alias_key(alias))
    }

    pub fn get(&self, alias: &str) -> Option<&HandleEntry<C>> {
        self.entries.get(&alias_key(alias))
    }

    pub fn lookup(&mut self, alias: &str) -> Option<&mut HandleEntry<C>> {
        self.entries.get_mut(&alias_key(alias))
    }

    /// Detach an entry. Its cursor must already be closed.
    pub fn remove(&mut self, alias: &str) -> Option<HandleEntry<C>> {
        let entry = self.entries.remove(&alias_key(alias))?;
        debug_assert!(!entry.is_open(), "removed handle '{}' still open", entry.name());
        Some(entry)
    }

    /// Entries accepted by `predicate`, in unspecified order
    pub fn iter_matching<'a, P>(
        &'a mut self,
        mut predicate: P,
    ) -> impl Iterator<Item = &'a mut HandleEntry<C>> + 'a
    where
        P: FnMut(&HandleEntry<C>) -> bool + 'a,
    {
        self.entries.values_mut().filter(move |e| predicate(e))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut HandleEntry<C>> {
        self.entries.values_mut()
    }

    /// Aliases of entries accepted by `predicate`
    pub fn aliases_matching<P>(&self, mut predicate: P) -> Vec<String>
    where
        P: FnMut(&HandleEntry<C>) -> bool,
    {
        self.entries
            .values()
            .filter(|e| predicate(e))
            .map(|e| e.name().alias().to_string())
            .collect()
    }

    /// All aliases, sorted
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases = self.aliases_matching(|_| true);
        aliases.sort();
        aliases
    }

    /// Destroy every entry. All cursors must already be closed.
    pub fn clear(&mut self) {
        debug_assert!(self.entries.values().all(|e| !e.is_open()));
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
