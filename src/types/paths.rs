use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::path::Path;

use internment::ArcIntern;
use serde::{Deserialize, Serialize};

/// Type for filenames that might not be real paths.
///
/// This is either an absolute real file path (that is UTF-8) or a string of the form
/// `<import>` for entries that were not read from a journal file.
#[derive(Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filename(ArcIntern<String>);

impl Filename {
    /// Internal helper to create a `Filename` from a path.
    fn from_ref(path: &str) -> Self {
        Self(ArcIntern::from_ref(path))
    }

    /// Create a dummy `Filename` like `<import>`.
    #[must_use]
    pub fn new_dummy(dummy: &str) -> Self {
        let value = format!("<{dummy}>");
        Self(ArcIntern::from(value))
    }
}

impl Deref for Filename {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for Filename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Filename").field(&self.0.as_ref()).finish()
    }
}

impl Display for Filename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub enum FilenameError {
    NonUnicode,
    NonAbsolute(String),
}

impl std::error::Error for FilenameError {}
impl Display for FilenameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::NonUnicode => write!(f, "Filepath is not valid unicode"),
            Self::NonAbsolute(m) => write!(f, "Filepath is not absolute: '{m}'"),
        }
    }
}

impl TryFrom<&str> for Filename {
    type Error = FilenameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.starts_with('<') {
            return Ok(Self::from_ref(value));
        }
        if !Path::new(value).is_absolute() {
            return Err(FilenameError::NonAbsolute(value.to_owned()));
        }
        Ok(Self::from_ref(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy() {
        assert_eq!(
            Filename::new_dummy("string"),
            Filename::try_from("<string>").unwrap()
        );
    }

    #[test]
    fn test_filename_from() {
        assert!(Filename::try_from("asdf").is_err());
        assert!(Filename::try_from("<string>").is_ok());
        assert!(Filename::try_from("/ledger/main.beancount").is_ok());
    }
}
