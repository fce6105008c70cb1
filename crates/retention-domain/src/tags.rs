//! Tag module - labels for selecting policies at run time

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Set of free-form policy labels
///
/// Ordering is irrelevant and case is preserved as given. An empty set is a
/// valid value; a policy never has "no tag set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list such as `foo,bar`
    ///
    /// Surrounding whitespace is trimmed and empty entries are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use retention_domain::TagSet;
    ///
    /// let tags = TagSet::parse("foo, bar,,");
    /// assert_eq!(tags.len(), 2);
    /// assert!(tags.contains("bar"));
    /// ```
    pub fn parse(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    /// Add a tag, returning whether it was new
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// Check whether a tag is present
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate tags in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether every tag in `self` is also in `other`
    pub fn is_subset(&self, other: &TagSet) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

/// Decide whether a policy's tags satisfy a run's tag filter
///
/// Every requested tag must be present on the policy (`requested ⊆ policy`).
/// An empty request matches every policy. This is subset semantics, not
/// "any tag in common".
///
/// # Examples
///
/// ```
/// use retention_domain::{matches, TagSet};
///
/// let policy = TagSet::parse("foo,bar,baz");
/// assert!(matches(&policy, &TagSet::parse("foo,bar")));
/// assert!(!matches(&TagSet::parse("foo"), &TagSet::parse("foo,unknown")));
/// assert!(matches(&TagSet::new(), &TagSet::new()));
/// ```
pub fn matches(policy_tags: &TagSet, requested: &TagSet) -> bool {
    requested.is_subset(policy_tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request_matches_everything() {
        assert!(matches(&TagSet::new(), &TagSet::new()));
        assert!(matches(&TagSet::parse("foo"), &TagSet::new()));
    }

    #[test]
    fn test_subset_matches() {
        let policy = TagSet::parse("foo,bar,baz");
        assert!(matches(&policy, &TagSet::parse("foo,bar")));
        assert!(matches(&policy, &TagSet::parse("baz,foo,bar")));
    }

    #[test]
    fn test_partial_overlap_does_not_match() {
        assert!(!matches(&TagSet::parse("foo"), &TagSet::parse("foo,unknown")));
        assert!(!matches(&TagSet::new(), &TagSet::parse("foo")));
    }

    #[test]
    fn test_case_is_preserved() {
        assert!(!matches(&TagSet::parse("Foo"), &TagSet::parse("foo")));
    }

    #[test]
    fn test_parse_and_display() {
        let tags = TagSet::parse(" bar , foo,bar ");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.to_string(), "bar,foo");
        assert!(TagSet::parse("").is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    fn tag_set() -> impl Strategy<Value = TagSet> {
        btree_set("[a-cA-C]{1,2}", 0..6).prop_map(|set| set.into_iter().collect())
    }

    proptest! {
        /// Property: an empty request matches any policy
        #[test]
        fn test_empty_request_property(policy in tag_set()) {
            prop_assert!(matches(&policy, &TagSet::new()));
        }

        /// Property: matching is exactly the subset relation
        #[test]
        fn test_matches_is_subset(policy in tag_set(), requested in tag_set()) {
            let expected = requested.iter().all(|tag| policy.contains(tag));
            prop_assert_eq!(matches(&policy, &requested), expected);
        }

        /// Property: a policy always matches a request for a subset of its own tags
        #[test]
        fn test_own_subset_matches(policy in tag_set(), keep in 0usize..6) {
            let requested: TagSet = policy.iter().take(keep).collect();
            prop_assert!(matches(&policy, &requested));
        }
    }
}
