//! Throwaway HTTP/1.1 server for the integration tests, over plain TCP or TLS.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::TlsAcceptor;

/// What the server does with one request.
pub enum Reply {
    /// Status + body, with a `Content-Length` header
    Json(u16, String),
    /// Status + body, delimited by closing the connection
    Unsized(u16, String),
    /// Like `Json`, sent only after the delay
    Delayed(Duration, u16, String),
    /// Never answer; report on `closed` once the client hangs up
    Stall,
}

/// Server certificate generated for the test run.
pub struct TestCert {
    pub pem: String,
    der: CertificateDer<'static>,
    key: PrivatePkcs8KeyDer<'static>,
}

/// Self-signed certificate valid for `names`.
pub fn self_signed(names: &[&str]) -> TestCert {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let certified = rcgen::generate_simple_self_signed(names).unwrap();
    TestCert {
        pem: certified.cert.pem(),
        der: certified.cert.der().clone(),
        key: PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()),
    }
}

/// Request as seen by the server.
#[derive(Debug, Clone)]
pub struct Seen {
    pub target: String,
    pub authorization: Option<String>,
}

pub struct TestServer {
    pub addr: SocketAddr,
    scheme: &'static str,
    /// One message per request received
    pub requests: mpsc::UnboundedReceiver<Seen>,
    /// One message per stalled connection closed by the client
    pub closed: mpsc::UnboundedReceiver<()>,
}

impl TestServer {
    /// TLS servers are addressed as `localhost`, the name in their certificate.
    pub fn url(&self, path: &str) -> String {
        match self.scheme {
            "https" => format!("https://localhost:{}{}", self.addr.port(), path),
            _ => format!("http://{}{}", self.addr, path),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub async fn serve<F>(handler: F) -> TestServer
where
    F: Fn(&Seen) -> Reply + Send + Sync + 'static,
{
    start(handler, None).await
}

/// Same as [`serve`], behind TLS with `cert`.
pub async fn serve_tls<F>(cert: &TestCert, handler: F) -> TestServer
where
    F: Fn(&Seen) -> Reply + Send + Sync + 'static,
{
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der.clone()], PrivateKeyDer::Pkcs8(cert.key.clone_key()))
        .unwrap();
    start(handler, Some(TlsAcceptor::from(Arc::new(config)))).await
}

async fn start<F>(handler: F, tls: Option<TlsAcceptor>) -> TestServer
where
    F: Fn(&Seen) -> Reply + Send + Sync + 'static,
{
    init_logging();
    let scheme = if tls.is_some() { "https" } else { "http" };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (req_tx, requests) = mpsc::unbounded_channel();
    let (closed_tx, closed) = mpsc::unbounded_channel();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let Ok((sock, _)) = listener.accept().await else { break };
            let handler = handler.clone();
            let req_tx = req_tx.clone();
            let closed_tx = closed_tx.clone();
            let tls = tls.clone();
            tokio::spawn(async move {
                match tls {
                    Some(acceptor) => {
                        // A client refusing the certificate ends the handshake here
                        if let Ok(stream) = acceptor.accept(sock).await {
                            handle(stream, handler.as_ref(), req_tx, closed_tx).await;
                        }
                    }
                    None => handle(sock, handler.as_ref(), req_tx, closed_tx).await,
                }
            });
        }
    });

    TestServer { addr, scheme, requests, closed }
}

async fn handle<S, F>(mut sock: S, handler: &F, req_tx: mpsc::UnboundedSender<Seen>, closed_tx: mpsc::UnboundedSender<()>)
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(&Seen) -> Reply,
{
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match sock.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let text = String::from_utf8_lossy(&head).into_owned();
    let target = text.split_whitespace().nth(1).unwrap_or("/").to_string();
    let authorization = text
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("authorization").then(|| value.trim().to_string())
        });

    let seen = Seen { target, authorization };
    let reply = handler(&seen);
    let _ = req_tx.send(seen);

    let reply = match reply {
        Reply::Delayed(delay, status, body) => {
            tokio::time::sleep(delay).await;
            Reply::Json(status, body)
        }
        other => other,
    };

    match reply {
        Reply::Json(status, body) => {
            let res = format!(
                "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = sock.write_all(res.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
        Reply::Unsized(status, body) => {
            let res = format!("HTTP/1.1 {status} Status\r\nconnection: close\r\n\r\n{body}");
            let _ = sock.write_all(res.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
        Reply::Delayed(..) => {}
        Reply::Stall => {
            // Client going away shows up as EOF or a reset
            loop {
                match sock.read(&mut buf).await {
                    Ok(0) | Err(_) => {
                        let _ = closed_tx.send(());
                        return;
                    }
                    Ok(_) => {}
                }
            }
        }
    }
}
