//! Routing table: routing key to connection source, plus one default.
//!
//! A table is assembled once through [`RoutingTableBuilder`] and is immutable
//! afterwards. Share it behind an `Arc`; reads need no locking.

use mds_core::{ConfigurationError, RoutingKey};
use std::{collections::HashMap, sync::Arc};

/// Immutable mapping from [`RoutingKey`] to connection source handle.
pub struct RoutingTable<S> {
    entries: HashMap<RoutingKey, Arc<S>>,
    order: Vec<RoutingKey>,
    default: Option<Arc<S>>,
    default_key: Option<RoutingKey>,
}

impl<S> RoutingTable<S> {
    /// Start building a table.
    pub fn builder() -> RoutingTableBuilder<S> {
        RoutingTableBuilder::default()
    }

    /// Build a table from `entries`, making `default_key` the default when given.
    ///
    /// Fails on duplicate or empty keys and when `default_key` names no entry.
    pub fn build<K, I>(entries: I, default_key: Option<&str>) -> Result<Self, ConfigurationError>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, S)>,
    {
        let mut builder = Self::builder();
        for (key, source) in entries {
            builder.insert(key, source)?;
        }
        if let Some(key) = default_key {
            builder = builder.default_key(key);
        }
        builder.build()
    }

    /// Look up the source registered under `key`.
    pub fn lookup(&self, key: &str) -> Option<&Arc<S>> {
        self.entries.get(key)
    }

    /// The default source, if one was configured.
    pub fn default(&self) -> Option<&Arc<S>> {
        self.default.as_ref()
    }

    /// The key the default source is registered under, if any.
    pub fn default_key(&self) -> Option<&RoutingKey> {
        self.default_key.as_ref()
    }

    /// Check if a key exists in the table.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &RoutingKey> {
        self.order.iter()
    }

    /// Get the number of routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S> std::fmt::Debug for RoutingTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("keys", &self.order)
            .field("default_key", &self.default_key)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Builder for [`RoutingTable`].
pub struct RoutingTableBuilder<S> {
    entries: HashMap<RoutingKey, Arc<S>>,
    order: Vec<RoutingKey>,
    primary: Option<RoutingKey>,
    default_key: Option<String>,
    fallback_to_first: bool,
}

impl<S> Default for RoutingTableBuilder<S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            primary: None,
            default_key: None,
            fallback_to_first: false,
        }
    }
}

impl<S> RoutingTableBuilder<S> {
    /// Insert a source under `key`.
    ///
    /// Returns an error if the key is empty or already taken.
    pub fn insert(&mut self, key: impl AsRef<str>, source: S) -> Result<(), ConfigurationError> {
        self.insert_shared(key, Arc::new(source))
    }

    /// Insert an already shared source under `key`.
    pub fn insert_shared(
        &mut self,
        key: impl AsRef<str>,
        source: Arc<S>,
    ) -> Result<(), ConfigurationError> {
        let key = RoutingKey::new(key)?;
        if self.entries.contains_key(&key) {
            return Err(ConfigurationError::DuplicateKey(key.to_string()));
        }
        self.order.push(key.clone());
        self.entries.insert(key, source);
        Ok(())
    }

    /// Insert the pre-existing, externally supplied source under `key`.
    ///
    /// Without an explicit default key, the primary source becomes the default.
    /// At most one primary may be registered; a rejected call leaves the
    /// builder unchanged.
    pub fn primary(&mut self, key: impl AsRef<str>, source: S) -> Result<(), ConfigurationError> {
        if self.primary.is_some() {
            return Err(ConfigurationError::MultiplePrimary(2));
        }
        let key = RoutingKey::new(key)?;
        self.insert_shared(key.as_str(), Arc::new(source))?;
        self.primary = Some(key);
        Ok(())
    }

    /// Name the entry that becomes the default source.
    pub fn default_key(mut self, key: impl Into<String>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    /// Without an explicit or primary default, use the first inserted entry.
    ///
    /// Off by default: a table without a default makes the router fail closed.
    pub fn fallback_to_first(mut self) -> Self {
        self.fallback_to_first = true;
        self
    }

    /// Number of entries inserted so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was inserted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the table, consuming the builder.
    pub fn build(self) -> Result<RoutingTable<S>, ConfigurationError> {
        let default_key = match self.default_key {
            Some(name) => {
                let key = RoutingKey::new(&name)?;
                if !self.entries.contains_key(&key) {
                    return Err(ConfigurationError::DefaultNotFound(name));
                }
                Some(key)
            }
            None if self.primary.is_some() => self.primary,
            None if self.fallback_to_first => self.order.first().cloned(),
            None => None,
        };
        let default = default_key
            .as_ref()
            .and_then(|key| self.entries.get(key))
            .cloned();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sources = self.order.len(),
            default = ?default_key,
            "routing table built"
        );

        Ok(RoutingTable {
            entries: self.entries,
            order: self.order,
            default,
            default_key,
        })
    }
}
