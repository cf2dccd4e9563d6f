//! Credentials attached to outbound requests.
//!
//! A [`CredentialsProvider`] is asked for credentials once per request, with the
//! resolved target URL. The secure client and the primary engine both use one,
//! so the username/password pair is always configuration, never a constant.

use crate::config::Credentials;
use url::Url;

/// Source of basic-auth credentials for a target.
///
/// Implementations must be `Send + Sync`, they are shared by all concurrent requests.
pub trait CredentialsProvider: Send + Sync {
    /// Returns the credentials to use for `url`, or `None` to send the request unauthenticated.
    fn credentials_for(&self, url: &Url) -> Option<Credentials>;
}

/// Provider scoped to any host: returns the same pair for every URL.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials_for(&self, _url: &Url) -> Option<Credentials> {
        Some(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_credentials_apply_to_any_host() {
        let provider = StaticCredentials::new(Credentials::new("monitor", "pw"));
        for url in ["https://a.example/", "http://10.0.0.1:9200/x"] {
            let creds = provider.credentials_for(&Url::parse(url).unwrap()).unwrap();
            assert_eq!(creds.username, "monitor");
        }
    }
}
