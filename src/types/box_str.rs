use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A wrapper around a `Box<str>`
///
/// We are dealing with immutable strings in most places, so avoid the memory of the capacity of a
/// `Vec`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxStr(Box<str>);

impl BoxStr {
    /// The contents as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BoxStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BoxStr {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for BoxStr {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}
