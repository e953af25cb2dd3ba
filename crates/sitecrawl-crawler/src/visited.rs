use dashmap::DashSet;

use crate::frontier::normalize;

/// URLs the crawl has already committed to, keyed on their normalized form.
///
/// Only one trailing `/` is normalized away: scheme, case, query and fragment all still make
/// two URLs distinct.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_visit(&self, url: &str) -> bool {
        !self.seen.contains(normalize(url))
    }

    /// Records `url`, returns `false` when it was already there.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.seen.insert(normalize(url).to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(normalize(url))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
