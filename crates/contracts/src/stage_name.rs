//! StageName - Cheap-to-clone stage program identifier
//!
//! Uses Arc<str> internally; one name is cloned into every invocation and
//! outcome that refers to the stage.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Stage programs the power-spectrum pipeline ships with.
///
/// Plans may name other programs; these are only used to warn on typos.
pub const KNOWN_STAGES: &[&str] = &[
    "pre_processer",
    "mocker",
    "mcmer",
    "filterer",
    "pcler",
    "transfer",
    "coadder",
];

/// Name of an external stage program.
///
/// # Examples
/// ```
/// use contracts::StageName;
///
/// let name: StageName = "filterer".into();
/// assert_eq!(name, "filterer");
/// assert!(name.is_known());
/// ```
#[derive(Clone, Default)]
pub struct StageName(Arc<str>);

impl StageName {
    /// Create a new StageName from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of [`KNOWN_STAGES`].
    pub fn is_known(&self) -> bool {
        KNOWN_STAGES.contains(&self.as_str())
    }
}

impl Deref for StageName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for StageName {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StageName {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StageName {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for StageName {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageName({:?})", self.0)
    }
}

impl PartialEq for StageName {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for StageName {}

impl PartialEq<str> for StageName {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for StageName {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Same hash as str so lookups by &str work in maps
impl Hash for StageName {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for StageName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
