//! TagId - Cheap-to-clone RFID tag identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// RFID tag identifier with cheap cloning.
///
/// Tags arrive as hex strings from the readers. They are normalized to upper
/// case on construction so `2a006d2d1b` and `2A006D2D1B` name the same animal.
/// Every event, tracker, chase and occupancy record carries one, so cloning
/// only bumps a reference count.
///
/// # Examples
/// ```
/// use contracts::TagId;
///
/// let id: TagId = "2a006d2d1b".into();
/// let id2 = id.clone();
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "2A006D2D1B");
/// ```
#[derive(Clone, Default)]
pub struct TagId(Arc<str>);

impl TagId {
    /// Create a new TagId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(normalize(s).as_str()))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the tag is a non-empty hex string.
    pub fn is_hex(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

impl Deref for TagId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for TagId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TagId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TagId {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TagId {
    #[inline]
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagId({:?})", self.0)
    }
}

impl PartialEq for TagId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for TagId {}

impl PartialEq<str> for TagId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for TagId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialOrd for TagId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

// Hash - same as str hash so HashMap<TagId, _> can be queried with &str
impl Hash for TagId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for TagId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TagId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clone_is_cheap() {
        let id1: TagId = "2A006D2D1B".into();
        let id2 = id1.clone();
        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_case_normalized() {
        let id: TagId = " 2a006d4f9f ".into();
        assert_eq!(id, "2A006D4F9F");
        assert_eq!(id, TagId::from("2A006D4F9F"));
    }

    #[test]
    fn test_hashmap_key() {
        let mut map: HashMap<TagId, i32> = HashMap::new();
        map.insert("AA01".into(), 1);
        map.insert("AA02".into(), 2);
        assert_eq!(map.get("AA01"), Some(&1));
        assert_eq!(map.get("AA02"), Some(&2));
    }

    #[test]
    fn test_ordering_and_hex() {
        let mut tags: Vec<TagId> = vec!["B1".into(), "A2".into(), "A1".into()];
        tags.sort();
        assert_eq!(tags, vec![TagId::from("A1"), "A2".into(), "B1".into()]);
        assert!(TagId::from("2a006d5af7").is_hex());
        assert!(!TagId::from("mouse-1").is_hex());
    }

    #[test]
    fn test_serde() {
        let id: TagId = "beef".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"BEEF\"");
        let parsed: TagId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
