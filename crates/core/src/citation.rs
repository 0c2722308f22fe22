use std::collections::HashSet;

/// Source URLs in first-seen order, each kept once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `url` unless it is already present. Returns whether it was new.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.seen.contains(&url) {
            return false;
        }

        self.seen.insert(url.clone());
        self.order.push(url);
        true
    }

    /// Set union; returns the URLs that were not present before, in order.
    pub fn merge<I, S>(&mut self, urls: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = Vec::new();
        for url in urls {
            let url: String = url.into();
            if self.insert(url.clone()) {
                added.push(url);
            }
        }
        added
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

impl<S: Into<String>> FromIterator<S> for CitationSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.merge(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_an_order_preserving_union() {
        let mut set = CitationSet::new();

        let first = set.merge(["u1", "u2"]);
        let second = set.merge(["u2", "u3"]);

        assert_eq!(first, vec!["u1", "u2"]);
        assert_eq!(second, vec!["u3"]);
        assert_eq!(set.as_slice(), ["u1", "u2", "u3"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut set: CitationSet = ["a", "b"].into_iter().collect();

        assert!(set.merge(["b", "a", "b"]).is_empty());
        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(!set.contains("c"));
    }

    #[test]
    fn duplicates_inside_one_batch_are_dropped() {
        let set: CitationSet = ["x", "x", "y", "x"].into_iter().collect();

        assert_eq!(set.into_vec(), vec!["x".to_string(), "y".to_string()]);
    }
}
