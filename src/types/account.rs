use std::fmt::{Debug, Display};

use internment::ArcIntern;
use serde::{Deserialize, Serialize};

/// Components of the account are separated by colons.
const SEPARATOR: char = ':';

/// The distinguished account name marking an account the classifier should fill in.
pub const UNKNOWN_ACCOUNT: &str = "Expenses:FIXME";

/// Prefix of unknown accounts that carry a grouping suffix, like `Expenses:FIXME:A`.
pub const UNKNOWN_ACCOUNT_PREFIX: &str = "Expenses:FIXME:";

/// An account name.
///
/// An account name is a string where components of the account are separated by `:`.
///
/// To speed up common operations on account names and reduce memory usage, this uses a string
/// interner.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account(ArcIntern<String>);

impl Account {
    /// The account as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The parent account, if there is one.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind(SEPARATOR)
            .map(|index| Self::from(&self.0[0..index]))
    }

    /// The account components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Get the root account.
    #[must_use]
    pub fn root(&self) -> Self {
        self.0
            .find(SEPARATOR)
            .map_or(self.clone(), |index| Self::from(&self.0[0..index]))
    }

    /// Whether this is an unknown account, i.e. one the classifier should replace.
    ///
    /// Unknown accounts are the literal `Expenses:FIXME` or any account below it.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0.as_str() == UNKNOWN_ACCOUNT || self.0.starts_with(UNKNOWN_ACCOUNT_PREFIX)
    }

    /// Whether this is an unknown account with a grouping suffix (`Expenses:FIXME:X`).
    ///
    /// Unknown postings sharing the same suffix must be classified together.
    #[must_use]
    pub fn is_suffixed_unknown(&self) -> bool {
        self.0.starts_with(UNKNOWN_ACCOUNT_PREFIX)
    }
}

/// Whether the two accounts may refer to the same real account.
///
/// Accounts are mergeable when they are equal or when either of them is unknown.
#[must_use]
pub fn accounts_mergeable(a: &Account, b: &Account) -> bool {
    a == b || a.is_unknown() || b.is_unknown()
}

impl Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Account").field(&self.0.as_ref()).finish()
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0.as_ref(), f)
    }
}

impl From<&str> for Account {
    fn from(s: &str) -> Self {
        Self(ArcIntern::from_ref(s))
    }
}
