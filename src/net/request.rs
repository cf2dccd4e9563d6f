use std::time::Duration;

use http::Method;
use url::Url;

use crate::config::{Credentials, EngineConfig};
use crate::errors::FetchError;
use crate::input::HttpInputSpec;
use crate::net::credentials::CredentialsProvider;
use crate::net::uri::build_url;

/// Everything needed to issue one GET request.
///
/// Built from an [`HttpInputSpec`] without any I/O. The timeouts override the
/// engine defaults for this request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub connect_timeout: Duration,
    pub socket_timeout: Duration,
    /// Sent as a basic `Authorization` header when present
    pub credentials: Option<Credentials>,
}

impl RequestDescriptor {
    /// Builds an unauthenticated descriptor.
    pub fn from_input(spec: &HttpInputSpec) -> Result<Self, FetchError> {
        let url = build_url(spec)?;

        Ok(Self {
            method: Method::GET,
            url,
            connect_timeout: Duration::from_millis(spec.connection_timeout.saturating_mul(1000)),
            socket_timeout: Duration::from_millis(spec.socket_timeout.saturating_mul(1000)),
            credentials: None,
        })
    }

    /// Builds a descriptor and asks `provider` for the credentials of the resolved URL.
    pub fn from_input_with(spec: &HttpInputSpec, provider: &dyn CredentialsProvider) -> Result<Self, FetchError> {
        let mut descriptor = Self::from_input(spec)?;
        descriptor.credentials = provider.credentials_for(&descriptor.url);
        Ok(descriptor)
    }

    /// Connect and socket timeouts to run this request with. A zero value
    /// falls back to the engine default.
    pub fn effective_timeouts(&self, defaults: &EngineConfig) -> (Duration, Duration) {
        let pick = |own: Duration, default: Duration| if own.is_zero() { default } else { own };
        (
            pick(self.connect_timeout, defaults.connect_timeout),
            pick(self.socket_timeout, defaults.socket_timeout),
        )
    }

    /// Turn the descriptor into a request on `client`.
    ///
    /// Timeouts are not set here: `client` must have been built for
    /// [`Self::effective_timeouts`].
    pub(crate) fn to_request(&self, client: &reqwest::Client) -> Result<reqwest::Request, FetchError> {
        let mut builder = client.request(self.method.clone(), self.url.clone());

        if let Some(creds) = &self.credentials {
            builder = builder.basic_auth(&creds.username, Some(&creds.password));
        }

        Ok(builder.build()?)
    }
}
