use std::fmt::{Debug, Display};

use internment::ArcIntern;
use serde::{Deserialize, Serialize};

/// A currency name.
///
/// This is a newtype wrapper so that we can transparently swap out the inner type
/// for a more fitting String-like type, make it immutable and avoid mixing them up with
/// other strings like account names.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Currency(ArcIntern<String>);

impl Currency {
    /// The currency as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Currency").field(&self.0.as_ref()).finish()
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0.as_ref(), f)
    }
}

#[cfg(test)]
impl PartialEq<str> for Currency {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self(ArcIntern::from_ref(s))
    }
}
