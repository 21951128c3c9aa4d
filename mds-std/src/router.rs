//! # Router
//!
//! Picks the connection source for the current call.
//!
//! On every request the router reads [`KeyContext::current`]:
//!
//! - key set and registered: that key's source
//! - key unset: the table's default source
//! - key set but unknown: the default source, with a warning
//! - no default: [`RoutingError::NoDefaultConfigured`]
//!
//! The router itself also implements [`ConnectionSource`], so it can stand in
//! wherever a single pool is expected.

use crate::table::RoutingTable;
use mds_core::{AcquireError, ConnectionSource, KeyContext, RoutingError, RoutingKey};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Resolves the active connection source from the call-scoped routing key.
pub struct Router<S> {
    table: Arc<RoutingTable<S>>,
    fallbacks: AtomicU64,
}

impl<S> Router<S> {
    /// Create a router over a finished table.
    pub fn new(table: Arc<RoutingTable<S>>) -> Self {
        Self {
            table,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// The table this router reads.
    pub fn table(&self) -> &Arc<RoutingTable<S>> {
        &self.table
    }

    /// Resolve the source for the key current on this call.
    pub fn resolve(&self) -> Result<Arc<S>, RoutingError> {
        self.resolve_key(KeyContext::current().as_ref())
    }

    /// Resolve the source for an explicit key.
    pub fn resolve_key(&self, key: Option<&RoutingKey>) -> Result<Arc<S>, RoutingError> {
        if let Some(source) = key.and_then(|k| self.table.lookup(k.as_str())) {
            return Ok(Arc::clone(source));
        }

        let Some(default) = self.table.default() else {
            #[cfg(feature = "tracing")]
            tracing::debug!(key = ?key, "no connection source matched and no default configured");
            return Err(RoutingError::NoDefaultConfigured {
                current: key.map(ToString::to_string),
            });
        };

        if let Some(key) = key {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::warn!(
                key = %key,
                default = ?self.table.default_key(),
                "routing key not found, falling back to default connection source"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = key;
        }

        Ok(Arc::clone(default))
    }

    /// How many times an unknown key fell back to the default source.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

impl<S> std::fmt::Debug for Router<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("table", &self.table)
            .field("fallbacks", &self.fallback_count())
            .finish()
    }
}

impl<S: ConnectionSource> ConnectionSource for Router<S> {
    type Connection = S::Connection;
    type Error = AcquireError<S::Error>;

    async fn acquire(&self) -> Result<Self::Connection, Self::Error> {
        let source = self.resolve()?;
        source.acquire().await.map_err(AcquireError::Source)
    }
}
