use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

/// A set of tags or a set of links.
///
/// We want this to be a set (i.e. contain no duplicate elements) and preserve insertion order.
/// Since these sets tend to be small, we can get away with having a bare Vec as a backing storage.
/// A more performant solution could be something like the indexmap crate (the Rust standard-library
/// `HashSet` does not preserve insertion order).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagsLinks(ThinVec<String>);

impl TagsLinks {
    #[must_use]
    pub fn new() -> Self {
        Self(ThinVec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert a tag or link. Returns whether it was newly inserted.
    pub fn insert(&mut self, value: String) -> bool {
        if self.0.contains(&value) {
            false
        } else {
            self.0.push(value);
            true
        }
    }

    /// Check whether a certain value is contained in the set.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| *v == value)
    }

    /// Reomve a tag or link. Returns whether it was present in the set.
    pub fn remove(&mut self, value: &str) -> bool {
        if let Some(index) = self.0.iter().position(|v| *v == value) {
            self.0.remove(index);
            true
        } else {
            false
        }
    }

    /// The union of the two sets, preserving insertion order.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for value in &other.0 {
            if !result.contains(value) {
                result.0.push(value.clone());
            }
        }
        result
    }

    /// Iterate over the values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for TagsLinks {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Into<String>> FromIterator<S> for TagsLinks {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut result = Self::new();
        for value in iter {
            result.insert(value.into());
        }
        result
    }
}
