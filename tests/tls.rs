mod common;

use common::{self_signed, serve_tls, Reply, TestServer};
use http_input::{
    ClientConfig, Credentials, EngineConfig, FetchError, HttpInputClient, HttpInputSpec, SecureClientConfig,
    TrustStrategy,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;

fn secure_client(server: &TestServer, trust: TrustStrategy) -> HttpInputClient {
    let secure = SecureClientConfig::new(Url::parse(&server.url("/")).unwrap())
        .credentials(Credentials::new("monitor", "pw"))
        .trust(trust)
        .engine(EngineConfig::builder().use_system_proxy(false).build().unwrap());

    HttpInputClient::new(ClientConfig {
        secure: Some(secure),
        ..ClientConfig::default()
    })
    .unwrap()
}

async fn health(client: &HttpInputClient) -> Result<serde_json::Value, FetchError> {
    let spec = HttpInputSpec::from_parts("https", "ignored.invalid").path("/_cluster/health");
    let map = client.secure().unwrap().get_map(&spec, &CancellationToken::new()).await?;
    Ok(map["status"].clone())
}

fn green(_: &common::Seen) -> Reply {
    Reply::Json(200, r#"{"status":"green"}"#.into())
}

#[tokio::test]
async fn accept_self_signed_trusts_a_self_signed_server() {
    let cert = self_signed(&["localhost"]);
    let mut server = serve_tls(&cert, green).await;
    let client = secure_client(&server, TrustStrategy::AcceptSelfSigned);

    assert_eq!(health(&client).await.unwrap(), json!("green"));

    let seen = server.requests.recv().await.unwrap();
    assert_eq!(seen.target, "/_cluster/health");
    assert_eq!(seen.authorization.as_deref(), Some("Basic bW9uaXRvcjpwdw=="));
}

#[tokio::test]
async fn accept_self_signed_still_checks_the_host_name() {
    let cert = self_signed(&["other.example"]);
    let server = serve_tls(&cert, green).await;
    let client = secure_client(&server, TrustStrategy::AcceptSelfSigned);

    let err = health(&client).await.unwrap_err();
    assert!(matches!(err, FetchError::Request(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn built_in_roots_reject_a_self_signed_server() {
    let cert = self_signed(&["localhost"]);
    let server = serve_tls(&cert, green).await;
    let client = secure_client(&server, TrustStrategy::BuiltIn);

    let err = health(&client).await.unwrap_err();
    assert!(err.is_request_failure(), "unexpected error: {err}");
    assert!(!err.is_cancelled());
}

#[tokio::test]
async fn custom_roots_trust_the_given_certificate() {
    let cert = self_signed(&["localhost"]);
    let server = serve_tls(&cert, green).await;
    let client = secure_client(&server, TrustStrategy::CustomRoots(cert.pem.clone().into_bytes()));

    assert_eq!(health(&client).await.unwrap(), json!("green"));
}
