use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

use crate::types::Filename;

use super::{Account, Amount, Currency, Date, Decimal, LineNumber, TagsLinks};

/// Possible metadata values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaValue {
    Account(Account),
    String(String),
    Tag(String),
    Date(Date),
    Bool(bool),
    Amount(Amount),
    Currency(Currency),
    Number(Decimal),
}

impl MetaValue {
    /// The contained date, if this value is a date.
    #[must_use]
    pub fn as_date(&self) -> Option<Date> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Date> for MetaValue {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

impl From<Decimal> for MetaValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Number(Decimal::from(value))
    }
}

/// A single key-value pair in metadata.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaKeyValuePair {
    pub key: String,
    pub value: Option<MetaValue>,
}

/// Metadata, a list of key-value pairs.
///
/// Keys stay in insertion order; the engine relies on this when unioning the metadata
/// of merged postings and transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(ThinVec<MetaKeyValuePair>);

impl FromIterator<MetaKeyValuePair> for Meta {
    fn from_iter<T: IntoIterator<Item = MetaKeyValuePair>>(iter: T) -> Self {
        Meta(ThinVec::from_iter(iter))
    }
}

impl Meta {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, value: MetaKeyValuePair) {
        self.0.push(value);
    }

    /// Add a key-value pair.
    pub fn add(&mut self, key: &str, value: impl Into<MetaValue>) {
        self.0.push(MetaKeyValuePair {
            key: key.to_owned(),
            value: Some(value.into()),
        });
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(index) = self.0.iter().position(|v| v.key == key) {
            self.0.remove(index);
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|m| m.key == key)
    }

    /// The value stored under the given key, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0
            .iter()
            .find(|m| m.key == key)
            .and_then(|m| m.value.as_ref())
    }

    /// Set the value for a key, replacing it in place or appending a new pair.
    pub fn set(&mut self, key: &str, value: impl Into<MetaValue>) {
        if let Some(pair) = self.0.iter_mut().find(|m| m.key == key) {
            pair.value = Some(value.into());
        } else {
            self.add(key, value);
        }
    }

    /// Iterate over the key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MetaKeyValuePair> {
        self.0.iter()
    }

    /// The union of the two metadata lists.
    ///
    /// Keys of `self` keep their position; values of `other` win for duplicate keys
    /// and new keys are appended in order.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for pair in &other.0 {
            if let Some(existing) = result.0.iter_mut().find(|m| m.key == pair.key) {
                existing.value = pair.value.clone();
            } else {
                result.0.push(pair.clone());
            }
        }
        result
    }
}

/// The "entry header", the data which all entries carry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Entry date.
    pub date: Date,
    /// Entry metadata.
    pub meta: Meta,
    /// Tags of the entry.
    pub tags: TagsLinks,
    /// Links of the entry.
    pub links: TagsLinks,
    /// The filename, absent for entries that do not come from a journal file.
    pub filename: Option<Filename>,
    /// The 1-based line number.
    pub line: LineNumber,
}

impl EntryHeader {
    /// Create a new entry header (with empty metadata, tags and links).
    #[must_use]
    pub fn new(date: Date, filename: Option<Filename>, line: LineNumber) -> Self {
        Self {
            date,
            meta: Meta::default(),
            tags: TagsLinks::default(),
            links: TagsLinks::default(),
            filename,
            line,
        }
    }

    /// Add a metadata entry.
    pub fn add_meta(&mut self, key: &str, value: impl Into<MetaValue>) {
        self.meta.add(key, value);
    }
}
