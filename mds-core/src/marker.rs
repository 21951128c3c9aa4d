//! # Markers and Call Sites
//!
//! A [`Marker`] is static metadata attached to a method (or to every method of
//! a type): "route this call to key `k`", or, with no key, "route this call to
//! the configured default key".
//!
//! A [`CallSite`] names the invoked method by its declaring type and method
//! name. Types declared through `#[routable]` are known by their full path as
//! given by [`std::any::type_name`]; [`CallSite::of`] builds such a site. A [`MatchPredicate`] answers whether a call site carries a marker,
//! searching the declaring type and its ancestors.

use crate::key::RoutingKey;
use std::fmt;

/// Identifies an invoked method by declaring type and method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    owner: &'static str,
    method: &'static str,
}

impl CallSite {
    /// Create a call site for `owner::method`.
    pub const fn new(owner: &'static str, method: &'static str) -> Self {
        Self { owner, method }
    }

    /// A call site on `T`, named the way `#[routable]` names it.
    pub fn of<T: ?Sized>(method: &'static str) -> Self {
        Self::new(std::any::type_name::<T>(), method)
    }

    /// The declaring type (or trait) name.
    pub const fn owner(&self) -> &'static str {
        self.owner
    }

    /// The method name.
    pub const fn method(&self) -> &'static str {
        self.method
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.method)
    }
}

/// Routing metadata resolved for a call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marker {
    key: Option<RoutingKey>,
}

impl Marker {
    /// A marker without an explicit key ("use the configured default key").
    pub const fn deferred() -> Self {
        Self { key: None }
    }

    /// A marker with an explicit key.
    pub fn keyed(key: RoutingKey) -> Self {
        Self { key: Some(key) }
    }

    /// Build a marker from declared text; empty text defers to the default.
    pub fn from_declared(key: &str) -> Self {
        Self {
            key: RoutingKey::from_marker(key),
        }
    }

    /// The explicit key, if one was declared.
    pub fn key(&self) -> Option<&RoutingKey> {
        self.key.as_ref()
    }
}

/// Decides whether a call is marked for routing.
///
/// Implementations must be pure queries over static metadata; they run on
/// every intercepted call.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot match call sites",
    label = "missing `MatchPredicate` implementation",
    note = "Implement `marker` to resolve routing metadata for a `CallSite`."
)]
pub trait MatchPredicate: Send + Sync {
    /// The first marker found for `site`, most specific declaration first.
    fn marker(&self, site: &CallSite) -> Option<Marker>;

    /// Whether `site` carries a marker anywhere in its type hierarchy.
    fn matches(&self, site: &CallSite) -> bool {
        self.marker(site).is_some()
    }

    /// The explicit key of the first marker found, if it declares one.
    fn declared_key(&self, site: &CallSite) -> Option<RoutingKey> {
        self.marker(site).and_then(|m| m.key)
    }
}

impl<T: MatchPredicate + ?Sized> MatchPredicate for std::sync::Arc<T> {
    fn marker(&self, site: &CallSite) -> Option<Marker> {
        (**self).marker(site)
    }
}

impl<T: MatchPredicate + ?Sized> MatchPredicate for Box<T> {
    fn marker(&self, site: &CallSite) -> Option<Marker> {
        (**self).marker(site)
    }
}
