//! Testing utilities for mds.
//!
//! - [`NamedSource`]: a connection source whose connections are just its name
//! - [`RecordingFactory`]: a [`SourceFactory`] that remembers what it built
//! - [`WarningCounter`]: a `tracing_subscriber` layer counting `WARN` events
//!
//! # Example
//!
//! ```rust,ignore
//! use mds_std::testing::{NamedSource, WarningCounter};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let counter = WarningCounter::new();
//! let subscriber = tracing_subscriber::registry().with(counter.clone());
//! tracing::subscriber::with_default(subscriber, || {
//!     KeyContext::scope(ghost, || router.resolve()).unwrap();
//! });
//! assert_eq!(counter.count(), 1);
//! ```

use crate::bootstrap::{DataSourceProperties, SourceFactory};
use mds_core::{BoxError, ConnectionSource};
use std::{
    convert::Infallible,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{Layer, layer::Context};

// ============================================================================
// Named Source
// ============================================================================

/// A connection source identified by name.
///
/// Acquiring a connection yields the source's name and bumps a counter, which
/// is enough to tell which handle a router picked.
#[derive(Debug, Default)]
pub struct NamedSource {
    name: String,
    acquisitions: AtomicUsize,
}

impl NamedSource {
    /// Create a source called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// The source's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many connections were acquired so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl ConnectionSource for NamedSource {
    type Connection = String;
    type Error = Infallible;

    async fn acquire(&self) -> Result<Self::Connection, Self::Error> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(self.name.clone())
    }
}

// ============================================================================
// Recording Factory
// ============================================================================

/// A factory building a [`NamedSource`] per configured source.
///
/// Each source is named after its `url`. Names passed to
/// [`fail_on`](Self::fail_on) make the factory fail for that source.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    built: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
}

impl RecordingFactory {
    /// Create a factory that builds everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to build the source called `name`.
    pub fn fail_on(mut self, name: impl Into<String>) -> Self {
        self.failing.push(name.into());
        self
    }

    /// Names of the sources built so far, in build order.
    pub fn built(&self) -> Vec<String> {
        self.built
            .lock()
            .map(|built| built.clone())
            .unwrap_or_default()
    }
}

impl SourceFactory for RecordingFactory {
    type Source = NamedSource;

    fn create(&self, properties: &DataSourceProperties) -> Result<Self::Source, BoxError> {
        if self.failing.contains(&properties.name) {
            return Err(format!("refusing to build `{}`", properties.name).into());
        }
        if let Ok(mut built) = self.built.lock() {
            built.push(properties.name.clone());
        }
        Ok(NamedSource::new(properties.url.clone()))
    }
}

// ============================================================================
// Warning Counter
// ============================================================================

/// A layer counting `WARN` level events.
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct WarningCounter {
    count: Arc<AtomicUsize>,
}

impl WarningCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of warnings seen.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Reset the counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[tokio::test]
    async fn test_named_source_counts_acquisitions() {
        let source = NamedSource::new("H1");
        assert_eq!(source.acquire().await.unwrap(), "H1");
        assert_eq!(source.acquire().await.unwrap(), "H1");
        assert_eq!(source.acquisitions(), 2);
    }

    #[test]
    fn test_recording_factory_records_and_fails() {
        let factory = RecordingFactory::new().fail_on("broken");
        let ok = DataSourceProperties::new("replica", "H2");
        let broken = DataSourceProperties::new("broken", "H3");

        assert_eq!(factory.create(&ok).unwrap().name(), "H2");
        assert!(factory.create(&broken).is_err());
        assert_eq!(factory.built(), ["replica"]);
    }

    #[test]
    fn test_warning_counter_ignores_other_levels() {
        let counter = WarningCounter::new();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("fine");
            tracing::warn!("careful");
            tracing::error!("broken");
        });
        assert_eq!(counter.count(), 1);
        counter.reset();
        assert_eq!(counter.count(), 0);
    }
}
