//! # mds-std
//!
//! Standard implementations for mds.
//!
//! This crate provides:
//! - **Routing table**: [`RoutingTable`], built once through [`RoutingTableBuilder`]
//! - **Router**: [`Router`], resolving the source for the current routing key
//! - **Marker index**: [`MarkerIndex`], the default `MatchPredicate`
//! - **Interceptor**: [`CallInterceptor`], scoping keys around marked calls
//! - **Bootstrap**: [`bootstrap`] from [`MdsProperties`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use mds_core;

// Modules
pub mod bootstrap;
pub mod interceptor;
pub mod matcher;
pub mod router;
pub mod table;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bootstrap::{DataSourceProperties, Mds, MdsProperties, SourceFactory, bootstrap};
pub use interceptor::{CallInterceptor, Interception};
pub use matcher::{
    AncestryDecl, MarkerDecl, MarkerIndex, MarkerIndexBuilder, OwnerName, SupertraitEdges,
};
pub use router::Router;
pub use table::{RoutingTable, RoutingTableBuilder};

#[cfg(feature = "inventory")]
pub use inventory;
