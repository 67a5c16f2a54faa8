use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize, de};

/// An transaction or posting flag.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Flag(u8);

impl Flag {
    pub const OKAY: Flag = Flag(b'*');
    pub const WARNING: Flag = Flag(b'!');
    pub const PADDING: Flag = Flag(b'P');
    pub const SUMMARIZE: Flag = Flag(b'S');
    pub const TRANSFER: Flag = Flag(b'T');
    pub const CONVERSIONS: Flag = Flag(b'C');
    pub const UNREALIZED: Flag = Flag(b'U');
    pub const RETURNS: Flag = Flag(b'R');
    pub const MERGING: Flag = Flag(b'M');
}

impl Serialize for Flag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let char: char = (*self).into();
        serializer.serialize_char(char)
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::OKAY
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let char = char::deserialize(deserializer)?;
        Self::try_from(char)
            .map_err(|_e| de::Error::invalid_value(de::Unexpected::Char(char), &"a valid flag"))
    }
}

impl Debug for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let char: char = (*self).into();
        f.debug_tuple("Flag").field(&char).finish()
    }
}
impl Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let char: char = (*self).into();
        Display::fmt(&char, f)
    }
}

impl TryFrom<u8> for Flag {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'A'..=b'Z' | b'*' | b'!' | b'&' | b'?' | b'%' | b'#' => Ok(Flag(value)),
            _ => Err(()),
        }
    }
}
impl TryFrom<char> for Flag {
    type Error = ();

    fn try_from(value: char) -> Result<Self, Self::Error> {
        if value.is_ascii() {
            Self::try_from(value as u8)
        } else {
            Err(())
        }
    }
}

impl TryFrom<&str> for Flag {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let first = value.as_bytes().first();
        match first {
            Some(inner) => Self::try_from(*inner),
            _ => Err(()),
        }
    }
}

impl From<Flag> for char {
    fn from(value: Flag) -> Self {
        Self::from_u32(value.0.into()).expect("flag to be valid character")
    }
}
