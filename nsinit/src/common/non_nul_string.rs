use serde::{Deserialize, Serialize, Serializer};
use std::{
    ffi::CString,
    fmt::{self, Formatter},
    ops::Deref,
    path::Path,
};
use thiserror::Error;

/// String that does not contain nul bytes and can be handed to `execve`
#[derive(Clone, Eq, PartialOrd, Ord, PartialEq, Hash)]
pub struct NonNulString(String);

impl NonNulString {
    /// Returns the underlying string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Nul byte error
#[derive(Error, Clone, Eq, PartialEq, Debug)]
#[error("invalid nul byte at position {0}")]
pub struct InvalidNulChar(usize);

impl InvalidNulChar {
    /// Returns the index of the nul byte
    pub fn pos(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NonNulString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NonNulString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl AsRef<str> for NonNulString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for NonNulString {
    fn as_ref(&self) -> &Path {
        Path::new(self.0.as_str())
    }
}

impl Deref for NonNulString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<NonNulString> for CString {
    fn from(s: NonNulString) -> Self {
        // Safe because the constructors reject nul bytes
        unsafe { CString::from_vec_unchecked(s.0.into()) }
    }
}

impl TryFrom<String> for NonNulString {
    type Error = InvalidNulChar;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match memchr::memchr(b'\0', value.as_bytes()) {
            Some(pos) => Err(InvalidNulChar(pos)),
            None => Ok(NonNulString(value)),
        }
    }
}

impl TryFrom<&str> for NonNulString {
    type Error = InvalidNulChar;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_string().try_into()
    }
}

impl Serialize for NonNulString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NonNulString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonNulString::try_from(s).map_err(serde::de::Error::custom)
    }
}
