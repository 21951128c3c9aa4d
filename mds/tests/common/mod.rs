#![allow(dead_code)]

use mds::{ConnectionSource, Router, RoutingKey, RoutingTable};
use mds_std::testing::NamedSource;
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

pub fn key(s: &str) -> RoutingKey {
    RoutingKey::new(s).unwrap()
}

/// `primary` (H1, default) and `replica` (H2).
pub fn primary_replica() -> Arc<Router<NamedSource>> {
    let mut builder = RoutingTable::builder();
    builder.primary("primary", NamedSource::new("H1")).unwrap();
    builder.insert("replica", NamedSource::new("H2")).unwrap();
    Arc::new(Router::new(Arc::new(builder.build().unwrap())))
}

/// Name of the source the router resolves right now.
pub fn serving(router: &Router<NamedSource>) -> String {
    router.resolve().unwrap().name().to_string()
}

// ============================================================================
// Repository
// ============================================================================

/// A data access object that asks the router for a connection on every call.
#[derive(Clone)]
pub struct PgUserRepo {
    pub router: Arc<Router<NamedSource>>,
}

impl PgUserRepo {
    pub fn new(router: Arc<Router<NamedSource>>) -> Self {
        Self { router }
    }

    pub fn find(&self, id: u64) -> (u64, String) {
        (id, serving(&self.router))
    }

    pub fn save(&self) -> String {
        serving(&self.router)
    }

    pub async fn find_async(&self, id: u64) -> (u64, String) {
        tokio::task::yield_now().await;
        let conn = self.router.acquire().await.unwrap();
        (id, conn)
    }
}
