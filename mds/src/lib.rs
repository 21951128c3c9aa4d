//! # mds - per-call connection source routing
//!
//! `mds` selects which of several named connection sources (database pools,
//! typically) serves a call, based on a routing key that is current only for
//! the duration of that call.
//!
//! - [`RoutingTable`] maps keys to sources and names one default.
//! - [`KeyContext`] holds the current key, scoped per thread and per future.
//! - [`Router`] resolves the source for the current key, falling back to the
//!   default (with a warning) for unknown keys.
//! - [`CallInterceptor`] makes a method's declared key current while it runs.
//! - [`MarkerIndex`] answers which methods are marked, including markers
//!   inherited from implemented traits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mds::prelude::*;
//!
//! #[mds::routable]
//! trait UserRepo {
//!     #[mds(key = "replica")]
//!     fn find(&self, id: u64) -> Option<User>;
//! }
//!
//! #[mds::routable]
//! impl UserRepo for PgUserRepo {
//!     fn find(&self, id: u64) -> Option<User> {
//!         let pool = self.router.resolve().ok()?;
//!         // ...
//!     }
//! }
//!
//! let mut table = RoutingTable::builder();
//! table.primary("primary", primary_pool)?;
//! table.insert("replica", replica_pool)?;
//! let router = Arc::new(Router::new(Arc::new(table.build()?)));
//!
//! let interceptor = CallInterceptor::new(MarkerIndex::from_inventory())
//!     .with_default_key(RoutingKey::new("primary")?);
//!
//! let user = interceptor.invoke(&CallSite::of::<PgUserRepo>("find"), || repo.find(42));
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use mds_core::{
    // Errors
    AcquireError,
    BoxError,
    // Markers
    CallSite,
    ConfigurationError,
    // Source
    ConnectionSource,
    // Context
    ContextGuard,
    ContextToken,
    KeyContext,
    KeyError,
    Marker,
    MatchPredicate,
    MdsError,
    Routed,
    RoutingError,
    // Key
    RoutingKey,
};

pub use mds_std::{
    AncestryDecl, CallInterceptor, DataSourceProperties, Interception, MarkerDecl, MarkerIndex,
    MarkerIndexBuilder, Mds, MdsProperties, OwnerName, Router, RoutingTable, RoutingTableBuilder,
    SourceFactory, SupertraitEdges, bootstrap,
};

/// Testing utilities.
#[cfg(feature = "testing")]
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use mds_std::testing::*;
}

/// Prelude module - common imports for mds.
///
/// # Usage
///
/// ```rust,ignore
/// use mds::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CallInterceptor, CallSite, ConnectionSource, KeyContext, MarkerIndex, MatchPredicate,
        Router, RoutingKey, RoutingTable,
    };
}

#[cfg(feature = "macros")]
pub use mds_macros::routable;

#[cfg(feature = "inventory")]
pub use inventory;
