//! URL construction for an [`HttpInputSpec`].

use std::net::Ipv6Addr;

use crate::errors::FetchError;
use crate::input::HttpInputSpec;
use url::Url;

const SUPPORTED_SCHEMES: [&str; 2] = ["http", "https"];

/// Resolve the target URL of an input.
///
/// A non-empty literal `url` is parsed as-is and no component of the input is
/// substituted into it. Otherwise the URL is assembled from scheme, host, port
/// and path, and every param is appended as a query pair in insertion order.
/// Empty params produce a URL without a query string.
pub fn build_url(spec: &HttpInputSpec) -> Result<Url, FetchError> {
    let url = if spec.has_literal_url() {
        Url::parse(&spec.url).map_err(|e| FetchError::malformed(&spec.url, e))?
    } else {
        from_components(spec)?
    };

    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(FetchError::malformed(url.as_str(), format!("unsupported scheme '{}'", url.scheme())));
    }

    Ok(url)
}

fn from_components(spec: &HttpInputSpec) -> Result<Url, FetchError> {
    let host = spec.host.trim();
    if host.is_empty() {
        return Err(FetchError::malformed(describe(spec), "neither url nor host is set"));
    }

    if host.contains(['@', '/', '\\', '?', '#']) {
        return Err(FetchError::malformed(describe(spec), "host must be a bare host name or IP address"));
    }

    // Bare IPv6 literals need brackets before they can be parsed as an authority
    let authority = if !host.contains(':') || (host.starts_with('[') && host.ends_with(']')) {
        host.to_string()
    } else if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        return Err(FetchError::malformed(describe(spec), "host must not carry a port, set the port separately"));
    };

    let mut url = Url::parse(&format!("{}://{}", spec.scheme, authority))
        .map_err(|e| FetchError::malformed(describe(spec), e))?;

    if url.cannot_be_a_base() {
        return Err(FetchError::malformed(describe(spec), "scheme cannot carry a host"));
    }

    if let Some(port) = spec.port {
        url.set_port(Some(port))
            .map_err(|_| FetchError::malformed(describe(spec), "port not allowed for this scheme"))?;
    }

    if !spec.path.is_empty() {
        url.set_path(&spec.path);
    }

    if !spec.params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &spec.params {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

// Human readable form of the components for error messages
fn describe(spec: &HttpInputSpec) -> String {
    match spec.port {
        Some(port) => format!("{}://{}:{}{}", spec.scheme, spec.host, port, spec.path),
        None => format!("{}://{}{}", spec.scheme, spec.host, spec.path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_url_wins_over_components() {
        let mut spec = HttpInputSpec::from_parts("http", "ignored.example")
            .port(1234)
            .path("/ignored")
            .param("ignored", "yes");
        spec.url = "https://metrics.example:9443/_stats?level=shards".to_string();

        let url = build_url(&spec).unwrap();
        assert_eq!(url, Url::parse("https://metrics.example:9443/_stats?level=shards").unwrap());
    }

    #[test]
    fn components_build_scheme_host_port_path() {
        let spec = HttpInputSpec::from_parts("http", "127.0.0.1")
            .port(9200)
            .path("/_cluster/health");

        let url = build_url(&spec).unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(9200));
        assert_eq!(url.path(), "/_cluster/health");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn params_keep_order_and_are_escaped() {
        let spec = HttpInputSpec::from_parts("https", "example.org")
            .path("/search")
            .param("z", "last?")
            .param("a", "a b&c")
            .param("m", "ü");

        let url = build_url(&spec).unwrap();
        assert_eq!(url.query(), Some("z=last%3F&a=a+b%26c&m=%C3%BC"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, spec.params);
    }

    #[test]
    fn default_port_is_still_reported() {
        let spec = HttpInputSpec::from_parts("https", "example.org").port(443);
        let url = build_url(&spec).unwrap();
        assert_eq!(url.port_or_known_default(), Some(443));
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let spec = HttpInputSpec::from_parts("http", "::1").port(8080);
        let url = build_url(&spec).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:8080/");
    }

    #[test]
    fn host_with_port_is_rejected() {
        for host in ["localhost:9200", "[::1]:9200"] {
            let err = build_url(&HttpInputSpec::from_parts("http", host)).unwrap_err();
            assert!(
                matches!(&err, FetchError::MalformedUrl { reason, .. } if reason.contains("port")),
                "{host}: {err}"
            );
        }
    }

    #[test]
    fn host_with_userinfo_or_path_is_rejected() {
        for host in ["user@evil", "example.org/admin", "example.org?x=1"] {
            let err = build_url(&HttpInputSpec::from_parts("http", host)).unwrap_err();
            assert!(
                matches!(&err, FetchError::MalformedUrl { reason, .. } if reason.contains("bare host")),
                "{host}: {err}"
            );
        }
    }

    #[test]
    fn malformed_literal_url_is_rejected() {
        let err = build_url(&HttpInputSpec::from_url("http://exa mple.com/")).unwrap_err();
        assert!(matches!(err, FetchError::MalformedUrl { .. }));

        let err = build_url(&HttpInputSpec::from_url("not a url")).unwrap_err();
        assert!(matches!(err, FetchError::MalformedUrl { .. }));
    }

    #[test]
    fn missing_host_and_url_is_rejected() {
        let err = build_url(&HttpInputSpec::default()).unwrap_err();
        assert!(matches!(err, FetchError::MalformedUrl { reason, .. } if reason.contains("host")));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = build_url(&HttpInputSpec::from_url("ftp://files.example/x")).unwrap_err();
        assert!(matches!(err, FetchError::MalformedUrl { reason, .. } if reason.contains("ftp")));

        let err = build_url(&HttpInputSpec::from_parts("gopher", "old.example")).unwrap_err();
        assert!(matches!(err, FetchError::MalformedUrl { .. }));
    }
}
