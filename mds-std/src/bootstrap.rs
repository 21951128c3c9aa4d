//! # Bootstrap
//!
//! Builds the routing state (table, router and interceptor) once at startup
//! from [`MdsProperties`].
//!
//! Pool construction is left to a [`SourceFactory`]; this module only decides
//! which sources exist, under which keys, and which one is the default.
//!
//! With the `config` feature, properties can be read from TOML:
//!
//! ```toml
//! enabled = true
//! default-name = "primary"
//!
//! [primary]
//! name = "primary"
//! url = "postgres://db-primary/app"
//!
//! [[datasources]]
//! name = "replica"
//! url = "postgres://db-replica/app"
//! driver-class-name = "postgres"
//! ```

use crate::{interceptor::CallInterceptor, router::Router, table::RoutingTable};
use mds_core::{
    BoxError, CallSite, ConfigurationError, ConnectionSource, MdsError, RoutingError, RoutingKey,
};
use std::{fmt, future::Future, sync::Arc};

#[cfg(feature = "config")]
fn default_true() -> bool {
    true
}

/// Connection settings for one named source.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "kebab-case"))]
pub struct DataSourceProperties {
    /// Name the source is registered under; doubles as its routing key.
    pub name: String,
    /// Driver identifier handed to the factory.
    #[cfg_attr(feature = "config", serde(default))]
    pub driver_class_name: Option<String>,
    /// Connection URL.
    #[cfg_attr(feature = "config", serde(default))]
    pub url: String,
    /// Login user.
    #[cfg_attr(feature = "config", serde(default))]
    pub username: Option<String>,
    /// Login password.
    #[cfg_attr(feature = "config", serde(default))]
    pub password: Option<String>,
    /// Pool implementation to build, when the factory supports several.
    #[cfg_attr(feature = "config", serde(default, rename = "type"))]
    pub kind: Option<String>,
}

impl DataSourceProperties {
    /// Properties for a source called `name` at `url`.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set login credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the driver identifier.
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver_class_name = Some(driver.into());
        self
    }
}

impl fmt::Debug for DataSourceProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceProperties")
            .field("name", &self.name)
            .field("driver_class_name", &self.driver_class_name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("kind", &self.kind)
            .finish()
    }
}

/// Top-level routing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "kebab-case"))]
pub struct MdsProperties {
    /// When false, [`bootstrap`] builds nothing.
    #[cfg_attr(feature = "config", serde(default = "default_true"))]
    pub enabled: bool,
    /// Key of the default source; falls back to the primary's name.
    #[cfg_attr(feature = "config", serde(default))]
    pub default_name: Option<String>,
    /// The primary source, built alongside `datasources` when no pre-existing
    /// source is supplied.
    #[cfg_attr(feature = "config", serde(default))]
    pub primary: Option<DataSourceProperties>,
    /// Additional named sources.
    #[cfg_attr(feature = "config", serde(default))]
    pub datasources: Vec<DataSourceProperties>,
}

impl Default for MdsProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            default_name: None,
            primary: None,
            datasources: Vec::new(),
        }
    }
}

impl MdsProperties {
    /// Enabled properties with nothing configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties from TOML text.
    #[cfg(feature = "config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(text).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }

    /// Turn routing on or off.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Name the default source.
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Set the primary source properties.
    pub fn with_primary(mut self, primary: DataSourceProperties) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Add a named source.
    pub fn with_datasource(mut self, datasource: DataSourceProperties) -> Self {
        self.datasources.push(datasource);
        self
    }

    /// The effective default name: `default_name`, else the primary's name.
    pub fn effective_default_name(&self) -> Option<&str> {
        self.default_name
            .as_deref()
            .or_else(|| self.primary.as_ref().map(|p| p.name.as_str()))
            .filter(|name| !name.is_empty())
    }
}

/// Builds one connection source from its properties.
pub trait SourceFactory {
    /// The connection source handle produced.
    type Source;

    /// Build the source described by `properties`.
    fn create(&self, properties: &DataSourceProperties) -> Result<Self::Source, BoxError>;
}

impl<S, F> SourceFactory for F
where
    F: Fn(&DataSourceProperties) -> Result<S, BoxError>,
{
    type Source = S;

    fn create(&self, properties: &DataSourceProperties) -> Result<Self::Source, BoxError> {
        self(properties)
    }
}

/// The routing state built by [`bootstrap`].
pub struct Mds<S, M> {
    table: Arc<RoutingTable<S>>,
    router: Arc<Router<S>>,
    interceptor: Arc<CallInterceptor<M>>,
}

impl<S, M> Mds<S, M> {
    /// Assemble routing state from its parts.
    pub fn new(table: Arc<RoutingTable<S>>, interceptor: CallInterceptor<M>) -> Self {
        Self {
            router: Arc::new(Router::new(Arc::clone(&table))),
            table,
            interceptor: Arc::new(interceptor),
        }
    }

    /// The routing table.
    pub fn table(&self) -> &Arc<RoutingTable<S>> {
        &self.table
    }

    /// The router, the handle to hand to data access code.
    pub fn router(&self) -> &Arc<Router<S>> {
        &self.router
    }

    /// The call interceptor.
    pub fn interceptor(&self) -> &Arc<CallInterceptor<M>> {
        &self.interceptor
    }

    /// Resolve the source for the key current on this call.
    pub fn resolve(&self) -> Result<Arc<S>, RoutingError> {
        self.router.resolve()
    }
}

impl<S, M: mds_core::MatchPredicate> Mds<S, M> {
    /// Run `call` as the method identified by `site`.
    pub fn invoke<R>(&self, site: &CallSite, call: impl FnOnce() -> R) -> R {
        self.interceptor.invoke(site, call)
    }

    /// Wrap `call` as the method identified by `site`.
    pub fn invoke_async<F: Future>(
        &self,
        site: &CallSite,
        call: F,
    ) -> futures::future::Either<mds_core::Routed<F>, F> {
        self.interceptor.invoke_async(site, call)
    }
}

impl<S: ConnectionSource, M> Mds<S, M> {
    /// Acquire a connection from the source selected for this call.
    pub async fn acquire(&self) -> Result<S::Connection, MdsError> {
        Ok(self.router.acquire().await?)
    }
}

impl<S, M> Clone for Mds<S, M> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            router: Arc::clone(&self.router),
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

impl<S, M> fmt::Debug for Mds<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mds")
            .field("table", &self.table)
            .field("default_key", &self.interceptor.default_key())
            .finish()
    }
}

/// Build the routing state described by `properties`.
///
/// `preexisting` holds sources created outside of mds (at most one). When
/// present it is registered under the default name and becomes the default;
/// otherwise the `primary` properties are built like any other source.
///
/// Returns `Ok(None)` when routing is disabled or nothing is configured.
pub fn bootstrap<F, M>(
    properties: MdsProperties,
    factory: &F,
    preexisting: Vec<F::Source>,
    matcher: M,
) -> Result<Option<Mds<F::Source, M>>, ConfigurationError>
where
    F: SourceFactory,
{
    if !properties.enabled {
        #[cfg(feature = "tracing")]
        tracing::info!("multi-source routing disabled");
        return Ok(None);
    }

    if preexisting.len() > 1 {
        #[cfg(feature = "tracing")]
        tracing::error!(
            found = preexisting.len(),
            "more than one pre-existing primary connection source"
        );
        return Err(ConfigurationError::MultiplePrimary(preexisting.len()));
    }

    let default_name = properties.effective_default_name().map(str::to_owned);
    let MdsProperties {
        primary,
        mut datasources,
        ..
    } = properties;

    let mut builder = RoutingTable::builder();
    match preexisting.into_iter().next() {
        Some(source) => {
            let name = default_name
                .as_deref()
                .ok_or(ConfigurationError::UnnamedPrimary)?;
            builder.primary(name, source)?;
        }
        None => datasources.extend(primary),
    }

    for props in &datasources {
        let source = factory
            .create(props)
            .map_err(|source| ConfigurationError::Source {
                name: props.name.clone(),
                source,
            })?;
        builder.insert(&props.name, source)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(name = %props.name, "connection source built");
    }

    if builder.is_empty() {
        #[cfg(feature = "tracing")]
        tracing::info!("no connection sources configured");
        return Ok(None);
    }

    if let Some(name) = &default_name {
        builder = builder.default_key(name.as_str());
    }
    let table = Arc::new(builder.build()?);

    let default_key = default_name.as_deref().and_then(RoutingKey::from_marker);
    let interceptor = CallInterceptor::new(matcher).with_default_key(default_key);

    #[cfg(feature = "tracing")]
    tracing::info!(
        sources = table.len(),
        default = ?table.default_key(),
        "multi-source routing ready"
    );

    Ok(Some(Mds::new(table, interceptor)))
}
