//! Routing keys.

use crate::error::KeyError;
use std::{borrow::Borrow, fmt, sync::Arc};

/// A non-empty, case-sensitive identifier selecting a connection source.
///
/// Cloning is cheap: the text is shared behind an `Arc`. The "unset" state is
/// expressed as `Option::<RoutingKey>::None`, so no key value is reserved.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey(Arc<str>);

impl RoutingKey {
    /// Create a routing key, rejecting empty text.
    pub fn new(key: impl AsRef<str>) -> Result<Self, KeyError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self(Arc::from(key)))
    }

    /// Interpret marker text: empty means "no explicit key".
    pub fn from_marker(key: &str) -> Option<Self> {
        Self::new(key).ok()
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoutingKey({:?})", &*self.0)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoutingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoutingKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for RoutingKey {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for RoutingKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(RoutingKey::new(""), Err(KeyError::Empty));
        assert!(RoutingKey::from_marker("").is_none());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let lower = RoutingKey::new("replica").unwrap();
        let upper = RoutingKey::new("Replica").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_map_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(RoutingKey::new("primary").unwrap(), 1);
        assert_eq!(map.get("primary"), Some(&1));
        assert_eq!(map.get("PRIMARY"), None);
    }
}
