//! Entry point of the fetch subsystem.
//!
//! [`HttpInputClient`] is built once per process. It owns the engine's I/O
//! worker pool, the primary [`AsyncEngine`] and, when configured, the
//! TLS-aware [`SecureClient`]. It is cheap to clone and safe to share between
//! any number of concurrent callers; nobody needs to lock it.
//!
//! ```rust,no_run
//! use http_input::{ClientConfig, HttpInputClient, HttpInputSpec};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), http_input::FetchError> {
//! let client = HttpInputClient::new(ClientConfig::default())?;
//! let spec = HttpInputSpec::from_parts("http", "localhost")
//!     .port(9200)
//!     .path("/_cluster/health");
//!
//! let health = client.fetch_map(&spec, &CancellationToken::new()).await?;
//! println!("cluster status: {}", health["status"]);
//!
//! client.shutdown();
//! # Ok(()) }
//! ```

use std::sync::{Arc, OnceLock};

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::errors::FetchError;
use crate::input::HttpInputSpec;
use crate::net::bridge;
use crate::net::credentials::{CredentialsProvider, StaticCredentials};
use crate::net::engine::AsyncEngine;
use crate::net::request::RequestDescriptor;
use crate::net::response::{Response, ResponseMapping};
use crate::net::runtime::IoRuntime;
use crate::net::secure::SecureClient;

#[derive(Clone)]
pub struct HttpInputClient {
    runtime: Arc<IoRuntime>,
    engine: AsyncEngine,
    secure: Option<SecureClient>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
}

impl HttpInputClient {
    /// Builds the worker pool and both clients.
    ///
    /// Nothing is returned unless every configured client could be built.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        config.engine.validate()?;

        let runtime = Arc::new(IoRuntime::new(config.engine.worker_threads)?);
        let engine = AsyncEngine::new(config.engine, runtime.clone())?;
        let secure = config
            .secure
            .map(|cfg| SecureClient::new(cfg, runtime.clone()))
            .transpose()?;
        let credentials = config
            .credentials
            .map(|c| Arc::new(StaticCredentials::new(c)) as Arc<dyn CredentialsProvider>);

        info!(
            "http input client ready (secure client: {})",
            if secure.is_some() { "configured" } else { "none" }
        );

        Ok(Self {
            runtime,
            engine,
            secure,
            credentials,
        })
    }

    pub fn engine(&self) -> &AsyncEngine {
        &self.engine
    }

    pub fn secure(&self) -> Option<&SecureClient> {
        self.secure.as_ref()
    }

    /// The request the primary engine sends for `spec`.
    pub fn request(&self, spec: &HttpInputSpec) -> Result<RequestDescriptor, FetchError> {
        match &self.credentials {
            Some(provider) => RequestDescriptor::from_input_with(spec, provider.as_ref()),
            None => RequestDescriptor::from_input(spec),
        }
    }

    /// GET `spec` through the primary engine. Any status is returned as a response.
    pub async fn fetch(&self, spec: &HttpInputSpec, cancel: &CancellationToken) -> Result<Response, FetchError> {
        let descriptor = self.request(spec)?;
        bridge::execute(&self.engine, &descriptor, cancel).await
    }

    /// GET `spec` and decode the JSON body.
    pub async fn fetch_map(&self, spec: &HttpInputSpec, cancel: &CancellationToken) -> Result<ResponseMapping, FetchError> {
        self.fetch(spec, cancel).await?.to_map()
    }

    /// Cancels every in-flight request of both clients and stops the worker pool.
    /// Later requests resolve with [`FetchError::Cancelled`].
    pub fn shutdown(&self) {
        debug!("http input client shutting down ({} in flight)", self.engine.in_flight());
        self.runtime.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime.is_shut_down()
    }
}

impl std::fmt::Debug for HttpInputClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInputClient")
            .field("engine", &self.engine)
            .field("secure", &self.secure)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

static GLOBAL: OnceLock<HttpInputClient> = OnceLock::new();

/// Installs the process-wide client. The first successful call wins; later
/// calls return the installed client and drop the one they built.
pub fn install(config: ClientConfig) -> Result<&'static HttpInputClient, FetchError> {
    if let Some(client) = GLOBAL.get() {
        return Ok(client);
    }
    let client = HttpInputClient::new(config)?;
    Ok(GLOBAL.get_or_init(|| client))
}

/// The process-wide client, if installed.
pub fn global() -> Option<&'static HttpInputClient> {
    GLOBAL.get()
}

/// Shutdown hook for the process-wide client.
pub fn shutdown_global() {
    if let Some(client) = GLOBAL.get() {
        client.shutdown();
    }
}
