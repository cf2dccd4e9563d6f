//! TLS-aware secondary client.
//!
//! Same engine as the primary client, but its `reqwest::Client` is built with a
//! configurable [`TrustStrategy`] and every request goes to one configured
//! target, authenticated through a [`CredentialsProvider`]. Error statuses are
//! reported as [`FetchError::Status`] instead of being handed back as responses.

use std::sync::Arc;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{SecureClientConfig, TrustStrategy};
use crate::errors::FetchError;
use crate::input::HttpInputSpec;
use crate::net::bridge;
use crate::net::credentials::{CredentialsProvider, StaticCredentials};
use crate::net::engine::{client_builder, AsyncEngine, ClientFactory};
use crate::net::request::RequestDescriptor;
use crate::net::response::{Response, ResponseMapping};
use crate::net::runtime::IoRuntime;
use crate::net::tls;

/// Longest error body kept in [`FetchError::Status`]
const MAX_ERROR_BODY: usize = 4096;

#[derive(Clone)]
pub struct SecureClient {
    engine: AsyncEngine,
    target: Url,
    credentials: Option<Arc<dyn CredentialsProvider>>,
}

impl SecureClient {
    /// Builds the TLS context and the client. Fails without side effects when
    /// the trust material or the target is unusable.
    pub fn new(config: SecureClientConfig, runtime: Arc<IoRuntime>) -> Result<Self, FetchError> {
        config.engine.validate()?;
        check_target(&config.target)?;

        let trust = Trust::prepare(&config.trust)?;
        let base = config.engine.clone();
        let factory: ClientFactory = Arc::new(move |connect, socket| {
            trust
                .apply(client_builder(&base, connect, socket).use_rustls_tls())
                .build()
                .map_err(|e| FetchError::ClientConstruction(format!("cannot build TLS client: {e}")))
        });

        let credentials = config
            .credentials
            .map(|c| Arc::new(StaticCredentials::new(c)) as Arc<dyn CredentialsProvider>);

        debug!("secure client ready for {}", config.target);

        Ok(Self {
            engine: AsyncEngine::with_factory(factory, config.engine, runtime)?,
            target: config.target,
            credentials,
        })
    }

    /// Replaces the credentials source.
    pub fn with_credentials_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn engine(&self) -> &AsyncEngine {
        &self.engine
    }

    /// Request for the path and query of the input, sent to the configured target.
    pub fn descriptor(&self, spec: &HttpInputSpec) -> Result<RequestDescriptor, FetchError> {
        let mut descriptor = RequestDescriptor::from_input(spec)?;
        descriptor.url = self.resolve(&descriptor.url);
        descriptor.credentials = self
            .credentials
            .as_ref()
            .and_then(|p| p.credentials_for(&descriptor.url));
        Ok(descriptor)
    }

    /// GET the input from the target. Non-2xx statuses fail with [`FetchError::Status`].
    pub async fn get(&self, spec: &HttpInputSpec, cancel: &CancellationToken) -> Result<Response, FetchError> {
        let descriptor = self.descriptor(spec)?;
        let response = bridge::execute(&self.engine, &descriptor, cancel).await?;

        if !response.is_success() {
            let mut body = String::from_utf8_lossy(&response.body).into_owned();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(FetchError::Status { status: response.status, body });
        }

        Ok(response)
    }

    pub async fn get_map(&self, spec: &HttpInputSpec, cancel: &CancellationToken) -> Result<ResponseMapping, FetchError> {
        self.get(spec, cancel).await?.to_map()
    }

    fn resolve(&self, url: &Url) -> Url {
        let mut resolved = self.target.clone();
        let base = self.target.path().trim_end_matches('/');
        resolved.set_path(&format!("{base}{}", url.path()));
        resolved.set_query(url.query());
        resolved
    }
}

impl std::fmt::Debug for SecureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureClient")
            .field("target", &self.target.as_str())
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

fn check_target(target: &Url) -> Result<(), FetchError> {
    if !matches!(target.scheme(), "http" | "https") || target.host_str().is_none() {
        return Err(FetchError::ClientConstruction(format!(
            "secure client target must be an http(s) URL with a host, got '{target}'"
        )));
    }
    Ok(())
}

/// Trust material parsed once and applied to every client of the engine.
#[derive(Clone)]
enum Trust {
    BuiltIn,
    SelfSigned(rustls::ClientConfig),
    Roots(Vec<reqwest::Certificate>),
}

impl Trust {
    fn prepare(strategy: &TrustStrategy) -> Result<Self, FetchError> {
        match strategy {
            TrustStrategy::BuiltIn => Ok(Trust::BuiltIn),
            TrustStrategy::AcceptSelfSigned => {
                warn!("TLS trust relaxed: single self-signed server certificates are accepted");
                Ok(Trust::SelfSigned(tls::self_signed_config()?))
            }
            TrustStrategy::CustomRoots(pem) => {
                let certs = reqwest::Certificate::from_pem_bundle(pem)
                    .map_err(|e| FetchError::ClientConstruction(format!("invalid trust material: {e}")))?;
                if certs.is_empty() {
                    return Err(FetchError::ClientConstruction(
                        "invalid trust material: no certificate found in PEM bundle".to_string(),
                    ));
                }
                Ok(Trust::Roots(certs))
            }
        }
    }

    fn apply(&self, builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        match self {
            Trust::BuiltIn => builder,
            Trust::SelfSigned(tls) => builder.use_preconfigured_tls(tls.clone()),
            Trust::Roots(certs) => certs
                .iter()
                .cloned()
                .fold(builder, |b, cert| b.add_root_certificate(cert)),
        }
    }
}
