//! Which token groups the user has expanded.
//!
//! Keyed by base token rather than spread id so it survives feed refreshes.

use fnv::FnvHashSet;
use smol_str::SmolStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: FnvHashSet<SmolStr>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `token`, returning whether it is now expanded
    pub fn toggle(&mut self, token: &str) -> bool {
        if self.expanded.remove(token) {
            false
        } else {
            self.expanded.insert(SmolStr::new(token));
            true
        }
    }

    pub fn is_expanded(&self, token: &str) -> bool {
        self.expanded.contains(token)
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}
