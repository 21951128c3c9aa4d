//! # mds-core
//!
//! Core types for mds, the per-call connection source router.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! connection-pool adapters and plugins that don't need the full `mds-std`
//! implementation.
//!
//! # Building Blocks
//!
//! ## Routing Keys ([`RoutingKey`])
//!
//! Non-empty, case-sensitive names of connection sources. "No key" is
//! `Option::None`, never a reserved string.
//!
//! ## Key Context ([`KeyContext`])
//!
//! Call-scoped "current key" storage. Marked calls push a key on entry and
//! restore the previous one on exit, in LIFO order. Futures carry their key
//! with them through [`Routed`].
//!
//! ## Markers ([`Marker`], [`MatchPredicate`])
//!
//! Static metadata on methods and types, and the predicate deciding whether a
//! [`CallSite`] is marked.
//!
//! ## Connection Sources ([`ConnectionSource`])
//!
//! The outbound seam to whatever actually opens connections.
//!
//! # Error Types
//!
//! - [`MdsError`] - Top-level error type
//! - [`ConfigurationError`] - Startup errors
//! - [`RoutingError`] - Call-time resolution errors
//! - [`AcquireError`] - Routing or source failure during acquisition

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod context;
mod error;
mod key;
mod marker;
mod source;

// Re-exports
pub use context::{ContextGuard, ContextToken, KeyContext, Routed};
pub use error::{AcquireError, BoxError, ConfigurationError, KeyError, MdsError, RoutingError};
pub use key::RoutingKey;
pub use marker::{CallSite, Marker, MatchPredicate};
pub use source::ConnectionSource;
