//! CallInterceptor - scoped routing around marked calls.
//!
//! The interceptor wraps a call explicitly: the caller names the [`CallSite`],
//! the interceptor asks its [`MatchPredicate`] for a marker, and if one is
//! found it makes the marker's key (or the configured default key) current
//! for exactly the duration of the call.
//!
//! # Example
//!
//! ```rust,ignore
//! use mds::{CallInterceptor, CallSite, MarkerIndex};
//!
//! const FIND: CallSite = CallSite::new("PgUserRepo", "find");
//!
//! let index = MarkerIndex::builder()
//!     .extends("PgUserRepo", "UserRepo")
//!     .mark_method("UserRepo", "find", "replica")
//!     .build();
//! let interceptor = CallInterceptor::new(index).with_default_key(primary);
//!
//! let user = interceptor.invoke(&FIND, || repo.find(id));
//! let user = interceptor.invoke_async(&FIND, repo.find_async(id)).await;
//! ```

use crate::matcher::MarkerIndex;
use futures::future::Either;
use mds_core::{CallSite, KeyContext, Marker, MatchPredicate, Routed, RoutingKey};
use std::future::Future;

/// What the interceptor does for a given call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// The call is not marked; the context is left alone.
    Passthrough,
    /// The call is marked; this key (or "unset") is current while it runs.
    Enter(Option<RoutingKey>),
}

impl Interception {
    /// Run `call`, with the entered key current when there is one.
    pub fn run<R>(self, call: impl FnOnce() -> R) -> R {
        match self {
            Interception::Enter(key) => KeyContext::scope(key, call),
            Interception::Passthrough => call(),
        }
    }

    /// Wrap `call` so the entered key is current whenever it is polled.
    pub fn run_async<F: Future>(self, call: F) -> Either<Routed<F>, F> {
        match self {
            Interception::Enter(key) => Either::Left(KeyContext::scope_future(key, call)),
            Interception::Passthrough => Either::Right(call),
        }
    }
}

/// Wraps marked calls with a push/restore of the routing key.
#[derive(Debug, Clone)]
pub struct CallInterceptor<M = MarkerIndex> {
    matcher: M,
    default_key: Option<RoutingKey>,
}

impl<M> CallInterceptor<M> {
    /// Create an interceptor without a default key.
    ///
    /// Marked calls that declare no key then run with the key unset, so the
    /// router hands out its default source.
    pub fn new(matcher: M) -> Self {
        Self {
            matcher,
            default_key: None,
        }
    }

    /// Set the key used by markers that declare none.
    pub fn with_default_key(mut self, key: impl Into<Option<RoutingKey>>) -> Self {
        self.default_key = key.into();
        self
    }

    /// The key used by markers that declare none.
    pub fn default_key(&self) -> Option<&RoutingKey> {
        self.default_key.as_ref()
    }

    /// The predicate deciding which calls are marked.
    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Decide what to do for an already resolved marker.
    pub fn interception_for(&self, marker: Option<Marker>) -> Interception {
        match marker {
            Some(marker) => Interception::Enter(
                marker
                    .key()
                    .cloned()
                    .or_else(|| self.default_key.clone()),
            ),
            None => Interception::Passthrough,
        }
    }

    /// Run `call` under an already resolved marker.
    pub fn invoke_marked<R>(&self, marker: Option<Marker>, call: impl FnOnce() -> R) -> R {
        self.interception_for(marker).run(call)
    }

    /// Run `call` under an already resolved marker, asynchronously.
    pub fn invoke_marked_async<F: Future>(
        &self,
        marker: Option<Marker>,
        call: F,
    ) -> Either<Routed<F>, F> {
        self.interception_for(marker).run_async(call)
    }
}

impl<M: MatchPredicate> CallInterceptor<M> {
    /// Decide what to do for `site`.
    pub fn intercept(&self, site: &CallSite) -> Interception {
        let interception = self.interception_for(self.matcher.marker(site));
        #[cfg(feature = "tracing")]
        if let Interception::Enter(ref key) = interception {
            tracing::trace!(site = %site, key = ?key, "routing marked call");
        }
        interception
    }

    /// Run `call` as the method identified by `site`.
    ///
    /// The call's result, error or panic passes through untouched; the prior
    /// key is restored on every exit path.
    pub fn invoke<R>(&self, site: &CallSite, call: impl FnOnce() -> R) -> R {
        self.intercept(site).run(call)
    }

    /// Wrap `call` as the method identified by `site`.
    ///
    /// The key travels with the returned future and is current whenever it is
    /// polled, whichever worker thread polls it.
    pub fn invoke_async<F: Future>(&self, site: &CallSite, call: F) -> Either<Routed<F>, F> {
        self.intercept(site).run_async(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIND: CallSite = CallSite::new("PgUserRepo", "find");
    const SAVE: CallSite = CallSite::new("PgUserRepo", "save");
    const AUDIT: CallSite = CallSite::new("PgUserRepo", "audit");

    fn key(s: &str) -> RoutingKey {
        RoutingKey::new(s).unwrap()
    }

    fn interceptor() -> CallInterceptor {
        let index = MarkerIndex::builder()
            .extends("PgUserRepo", "UserRepo")
            .mark_method("UserRepo", "find", "replica")
            .mark_method("UserRepo", "save", "")
            .build();
        CallInterceptor::new(index).with_default_key(key("primary"))
    }

    #[test]
    fn test_explicit_key_is_current_inside_call() {
        let seen = interceptor().invoke(&FIND, KeyContext::current);
        assert_eq!(seen, Some(key("replica")));
        assert!(KeyContext::current().is_none());
    }

    #[test]
    fn test_empty_marker_uses_configured_default_key() {
        let seen = interceptor().invoke(&SAVE, KeyContext::current);
        assert_eq!(seen, Some(key("primary")));
    }

    #[test]
    fn test_empty_marker_without_default_key_masks_outer_key() {
        let interceptor = CallInterceptor::new(interceptor().matcher().clone());
        let seen = KeyContext::scope(key("replica"), || {
            interceptor.invoke(&SAVE, KeyContext::current)
        });
        assert_eq!(seen, None);
    }

    #[test]
    fn test_unmarked_call_passes_through() {
        let interceptor = interceptor();
        assert_eq!(interceptor.intercept(&AUDIT), Interception::Passthrough);
        let seen = KeyContext::scope(key("outer"), || {
            interceptor.invoke(&AUDIT, KeyContext::current)
        });
        assert_eq!(seen, Some(key("outer")));
    }

    #[test]
    fn test_nested_calls_restore_in_order() {
        let interceptor = interceptor();
        let (inner, after_inner) = interceptor.invoke(&SAVE, || {
            let inner = interceptor.invoke(&FIND, KeyContext::current);
            (inner, KeyContext::current())
        });
        assert_eq!(inner, Some(key("replica")));
        assert_eq!(after_inner, Some(key("primary")));
        assert!(KeyContext::current().is_none());
    }

    #[test]
    fn test_error_propagates_unchanged() {
        let result: Result<(), &str> = interceptor().invoke(&FIND, || Err("boom"));
        assert_eq!(result, Err("boom"));
        assert!(KeyContext::current().is_none());
    }

    #[test]
    fn test_panic_restores_context() {
        let interceptor = interceptor();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            interceptor.invoke::<()>(&FIND, || panic!("boom"))
        }));
        assert!(result.is_err());
        assert!(KeyContext::current().is_none());
    }

    #[test]
    fn test_invoke_marked_with_explicit_marker() {
        let interceptor = interceptor();
        let seen = interceptor.invoke_marked(Some(Marker::from_declared("analytics")), || {
            KeyContext::current()
        });
        assert_eq!(seen, Some(key("analytics")));
        assert_eq!(interceptor.invoke_marked(None, KeyContext::current), None);
    }

    #[test]
    fn test_interception_run() {
        let outer = KeyContext::scope(key("outer"), || {
            (
                Interception::Enter(Some(key("replica"))).run(KeyContext::current),
                Interception::Enter(None).run(KeyContext::current),
                Interception::Passthrough.run(KeyContext::current),
            )
        });
        assert_eq!(outer, (Some(key("replica")), None, Some(key("outer"))));
    }

    #[tokio::test]
    async fn test_invoke_marked_async_matches_invoke_async() {
        let interceptor = interceptor();

        let deferred = interceptor.invoke_marked_async(Some(Marker::deferred()), async {
            KeyContext::current()
        });
        assert!(matches!(deferred, Either::Left(_)));
        assert_eq!(deferred.await, Some(key("primary")));

        let unmarked = interceptor.invoke_marked_async(None, async { KeyContext::current() });
        assert!(matches!(unmarked, Either::Right(_)));
        assert_eq!(unmarked.await, None);

        let by_site = interceptor.invoke_async(&AUDIT, async { KeyContext::current() });
        assert!(matches!(by_site, Either::Right(_)));
    }

    #[tokio::test]
    async fn test_async_key_follows_future() {
        let interceptor = interceptor();
        let seen = interceptor
            .invoke_async(&FIND, async {
                tokio::task::yield_now().await;
                KeyContext::current()
            })
            .await;
        assert_eq!(seen, Some(key("replica")));
        assert!(KeyContext::current().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_do_not_share_keys() {
        let interceptor = std::sync::Arc::new(interceptor());
        let mut handles = Vec::new();
        for i in 0..32 {
            let interceptor = interceptor.clone();
            handles.push(tokio::spawn(async move {
                let site = if i % 2 == 0 { FIND } else { SAVE };
                interceptor
                    .invoke_async(&site, async {
                        for _ in 0..4 {
                            tokio::task::yield_now().await;
                        }
                        KeyContext::current()
                    })
                    .await
                    .map(|k| (i, k))
            }));
        }
        for handle in handles {
            let (i, seen) = handle.await.unwrap().unwrap();
            let expected = if i % 2 == 0 { "replica" } else { "primary" };
            assert_eq!(seen.as_str(), expected);
        }
    }
}
