//! Declarative description of an HTTP GET target.
//!
//! An [`HttpInputSpec`] either carries a literal `url`, or the discrete
//! `scheme`/`host`/`port`/`path`/`params` components. A non-empty `url` always
//! wins over the components. It deserializes from the monitor JSON shape:
//!
//! ```json
//! { "scheme": "https", "host": "metrics.local", "port": 9200,
//!   "path": "/_cluster/health", "params": { "level": "indices" },
//!   "connection_timeout": 5, "socket_timeout": 10 }
//! ```

use serde::Deserialize;

pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpInputSpec {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    /// Query parameters, applied in insertion order
    #[serde(deserialize_with = "ordered_params")]
    pub params: Vec<(String, String)>,
    pub url: String,
    /// Whole seconds
    pub connection_timeout: u64,
    /// Whole seconds
    pub socket_timeout: u64,
}

impl Default for HttpInputSpec {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: String::new(),
            port: None,
            path: String::new(),
            params: Vec::new(),
            url: String::new(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT_SECS,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT_SECS,
        }
    }
}

impl HttpInputSpec {
    /// Input pointing at a literal URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Input built from components. Add the port, path and params with the chained setters.
    pub fn from_parts(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn timeouts(mut self, connection_timeout: u64, socket_timeout: u64) -> Self {
        self.connection_timeout = connection_timeout;
        self.socket_timeout = socket_timeout;
        self
    }

    /// True when the literal `url` takes precedence over the components.
    pub fn has_literal_url(&self) -> bool {
        !self.url.is_empty()
    }
}

// A JSON object read through serde_json's order-preserving map keeps the
// declaration order of the keys.
fn ordered_params<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => Ok((k, s)),
            serde_json::Value::Number(n) => Ok((k, n.to_string())),
            serde_json::Value::Bool(b) => Ok((k, b.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "param '{k}' must be a scalar, got {other}"
            ))),
        })
        .collect()
}
