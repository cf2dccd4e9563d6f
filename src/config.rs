//! Client configuration.
//!
//! [`EngineConfig`] holds the process-wide defaults of the pooled async engine
//! (timeouts, pool size, body limit). It provides defaults via [`Default`] and a
//! validating [`EngineConfig::builder()`].
//!
//! [`SecureClientConfig`] describes the TLS-aware secondary client. It has no
//! default on purpose: the target, trust strategy and credentials are always
//! explicit inputs.
//!
//! ```rust
//! use std::time::Duration;
//! use http_input::config::EngineConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = EngineConfig::builder()
//!     .connect_timeout(Duration::from_secs(2))
//!     .max_connections(50)
//!     .build()?;
//! assert_eq!(cfg.socket_timeout, Duration::from_secs(10));
//! # Ok(()) }
//! ```

use std::fmt;
use std::time::Duration;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("http-input/", env!("CARGO_PKG_VERSION"));

/// 100 MiB
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 100 * 1024 * 1024;

/// Process-wide configuration of the async engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum time to establish a TCP/TLS connection
    pub connect_timeout: Duration,
    /// Maximum time a request waits for a free connection slot in the pool
    pub connection_request_timeout: Duration,
    /// Maximum time between two reads on an established connection
    pub socket_timeout: Duration,
    /// Number of requests the engine runs at the same time
    pub max_connections: usize,
    /// Idle pooled connections kept per host
    pub max_idle_per_host: usize,
    /// Responses larger than this are rejected
    pub max_content_length: u64,
    /// Worker threads of the engine's I/O pool
    pub worker_threads: usize,
    /// Honor the system proxy configuration (`HTTP_PROXY`, `HTTPS_PROXY`, `NO_PROXY`)
    pub use_system_proxy: bool,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            connection_request_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(10),
            max_connections: 20,
            max_idle_per_host: 2,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            worker_threads: 2,
            use_system_proxy: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("connection_request_timeout", self.connection_request_timeout),
            ("socket_timeout", self.socket_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.max_content_length == 0 {
            return Err(ConfigError::ZeroContentLength);
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    inner: EngineConfig,
}

impl EngineConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn connect_timeout(self, d: Duration) -> Self { self.map(|c| c.connect_timeout = d) }
    pub fn connection_request_timeout(self, d: Duration) -> Self { self.map(|c| c.connection_request_timeout = d) }
    pub fn socket_timeout(self, d: Duration) -> Self { self.map(|c| c.socket_timeout = d) }
    pub fn max_connections(self, n: usize) -> Self { self.map(|c| c.max_connections = n) }
    pub fn max_idle_per_host(self, n: usize) -> Self { self.map(|c| c.max_idle_per_host = n) }
    pub fn max_content_length(self, bytes: u64) -> Self { self.map(|c| c.max_content_length = bytes) }
    pub fn worker_threads(self, n: usize) -> Self { self.map(|c| c.worker_threads = n) }
    pub fn use_system_proxy(self, on: bool) -> Self { self.map(|c| c.use_system_proxy = on) }
    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = ua.into()) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroTimeout(&'static str),
    ZeroConnections,
    ZeroWorkers,
    ZeroContentLength,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTimeout(name) => write!(f, "{name} must be greater than zero"),
            ConfigError::ZeroConnections => write!(f, "max_connections must be at least 1"),
            ConfigError::ZeroWorkers => write!(f, "worker_threads must be at least 1"),
            ConfigError::ZeroContentLength => write!(f, "max_content_length must be at least 1 byte"),
        }
    }
}
impl std::error::Error for ConfigError {}

/// Username/password pair used for basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Policy deciding which server certificates the secure client accepts.
#[derive(Debug, Clone, Default)]
pub enum TrustStrategy {
    /// Built-in (webpki) root certificates only
    #[default]
    BuiltIn,
    /// Accept self-signed (and otherwise unverifiable) certificates. Only meant
    /// for local and test clusters.
    AcceptSelfSigned,
    /// Trust the certificates of this PEM bundle in addition to the built-in roots
    CustomRoots(Vec<u8>),
}

/// Configuration of the TLS-aware secondary client.
#[derive(Debug, Clone)]
pub struct SecureClientConfig {
    /// Base URL every request of the secure client is resolved against
    pub target: Url,
    pub credentials: Option<Credentials>,
    pub trust: TrustStrategy,
    pub engine: EngineConfig,
}

impl SecureClientConfig {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            credentials: None,
            trust: TrustStrategy::default(),
            engine: EngineConfig::default(),
        }
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn trust(mut self, trust: TrustStrategy) -> Self {
        self.trust = trust;
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Everything needed to build an [`HttpInputClient`](crate::client::HttpInputClient).
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Defaults of the primary engine; the I/O worker pool is sized from it
    pub engine: EngineConfig,
    /// Basic-auth credentials sent by the primary engine with every request
    pub credentials: Option<Credentials>,
    /// Secondary client, only built when configured
    pub secure: Option<SecureClientConfig>,
}
