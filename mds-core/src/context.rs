//! # Key Context
//!
//! Call-scoped storage of the "current routing key".
//!
//! Each thread owns one slot. A marked call pushes its key, and the returned
//! [`ContextToken`] restores whatever was there before, which makes nested
//! marked calls unwind in LIFO order.
//!
//! # Sync vs Async
//!
//! Synchronous code can never yield inside a pushed scope, so a plain
//! thread-local slot is enough. Futures are different: a work-stealing
//! executor may poll the same task on several worker threads. [`Routed`]
//! therefore carries the key with the future and installs it around every
//! `poll`, removing it again before the task yields.
//!
//! ```rust,ignore
//! let key = RoutingKey::new("replica")?;
//! KeyContext::scope(key, || {
//!     assert_eq!(KeyContext::current().unwrap().as_str(), "replica");
//! });
//! assert!(KeyContext::current().is_none());
//! ```

use crate::key::RoutingKey;
use std::{
    cell::RefCell,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
};

struct Slot {
    key: Option<RoutingKey>,
    depth: usize,
}

thread_local! {
    static CURRENT: RefCell<Slot> = const {
        RefCell::new(Slot {
            key: None,
            depth: 0,
        })
    };
}

/// Namespace for the per-thread routing key slot.
pub struct KeyContext;

/// Receipt for a [`KeyContext::push`]; hand it back to [`KeyContext::pop`].
///
/// Tokens are bound to the thread that created them.
#[must_use = "a pushed routing key must be popped with its token"]
#[derive(Debug)]
pub struct ContextToken {
    prior: Option<RoutingKey>,
    depth: usize,
    _thread_bound: PhantomData<*const ()>,
}

impl ContextToken {
    /// The key that was current before the push.
    pub fn prior(&self) -> Option<&RoutingKey> {
        self.prior.as_ref()
    }

    /// Nesting depth this token was issued at (1 for the outermost push).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl KeyContext {
    /// Make `key` current, remembering the previous value.
    ///
    /// Pushing `None` masks any outer key until the token is popped.
    pub fn push(key: impl Into<Option<RoutingKey>>) -> ContextToken {
        CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            let prior = std::mem::replace(&mut slot.key, key.into());
            slot.depth += 1;
            ContextToken {
                prior,
                depth: slot.depth,
                _thread_bound: PhantomData,
            }
        })
    }

    /// Restore the value recorded by `token`.
    ///
    /// Tokens must be popped in reverse push order.
    pub fn pop(token: ContextToken) {
        // The slot may already be gone while the thread is shutting down.
        let _ = CURRENT.try_with(|slot| {
            let mut slot = slot.borrow_mut();
            slot.key = token.prior;
            slot.depth = token.depth.saturating_sub(1);
        });
    }

    /// Snapshot of the current key, `None` when unset.
    pub fn current() -> Option<RoutingKey> {
        CURRENT
            .try_with(|slot| slot.borrow().key.clone())
            .ok()
            .flatten()
    }

    /// Number of keys currently pushed on this thread.
    pub fn depth() -> usize {
        CURRENT.try_with(|slot| slot.borrow().depth).unwrap_or(0)
    }

    /// Push `key` and return a guard that pops it when dropped.
    pub fn enter(key: impl Into<Option<RoutingKey>>) -> ContextGuard {
        ContextGuard {
            token: Some(Self::push(key)),
        }
    }

    /// Run `f` with `key` current, restoring the prior key on every exit path.
    pub fn scope<R>(key: impl Into<Option<RoutingKey>>, f: impl FnOnce() -> R) -> R {
        let _guard = Self::enter(key);
        f()
    }

    /// Bind `key` to a future so it is current whenever the future is polled.
    pub fn scope_future<F: Future>(key: impl Into<Option<RoutingKey>>, future: F) -> Routed<F> {
        Routed::new(key, future)
    }
}

/// RAII guard returned by [`KeyContext::enter`].
///
/// Dropping the guard restores the prior key, including during unwinding.
#[must_use = "dropping the guard immediately restores the prior key"]
#[derive(Debug)]
pub struct ContextGuard {
    token: Option<ContextToken>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            KeyContext::pop(token);
        }
    }
}

/// A future that installs its routing key around every poll.
///
/// Created by [`KeyContext::scope_future`].
pub struct Routed<F> {
    inner: Pin<Box<F>>,
    key: Option<RoutingKey>,
}

impl<F> Routed<F> {
    /// Wrap `future` so that `key` is current while it runs.
    pub fn new(key: impl Into<Option<RoutingKey>>, future: F) -> Self {
        Self {
            inner: Box::pin(future),
            key: key.into(),
        }
    }

    /// The key installed while polling.
    pub fn key(&self) -> Option<&RoutingKey> {
        self.key.as_ref()
    }
}

impl<F: Future> Future for Routed<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _guard = KeyContext::enter(this.key.clone());
        this.inner.as_mut().poll(cx)
    }
}
