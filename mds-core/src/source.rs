//! # Connection Sources
//!
//! The outbound seam to the connection-pool layer. mds never opens, closes or
//! pools connections; it only picks which [`ConnectionSource`] answers the next
//! request.

use std::{future::Future, sync::Arc};

/// Something that hands out connections: a pool, a driver handle, a test stub.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `ConnectionSource`",
    label = "missing `ConnectionSource` implementation",
    note = "Implement `acquire` to hand out connections."
)]
pub trait ConnectionSource: Send + Sync {
    /// The connection type handed out.
    type Connection;
    /// The failure type of [`acquire`](Self::acquire).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Obtain a connection.
    fn acquire(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

impl<T: ConnectionSource> ConnectionSource for Arc<T> {
    type Connection = T::Connection;
    type Error = T::Error;

    fn acquire(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        (**self).acquire()
    }
}
