//! Certificate verification for [`TrustStrategy::AcceptSelfSigned`].
//!
//! A server presenting exactly one certificate that was issued and signed by
//! its own key is trusted, as long as the certificate is valid for the host
//! name and within its validity period. Any other chain goes through the
//! regular webpki verification against the built-in roots.
//!
//! Self-signed certificates carrying `CA:TRUE` basic constraints are not
//! accepted this way; trust those with [`TrustStrategy::CustomRoots`].
//!
//! [`TrustStrategy::AcceptSelfSigned`]: crate::config::TrustStrategy::AcceptSelfSigned
//! [`TrustStrategy::CustomRoots`]: crate::config::TrustStrategy::CustomRoots

use std::sync::Arc;

use log::debug;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error, RootCertStore, SignatureScheme};

use crate::errors::FetchError;

/// rustls client configuration trusting single self-signed certificates.
pub(crate) fn self_signed_config() -> Result<rustls::ClientConfig, FetchError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = SelfSignedVerifier::new(provider.clone())?;

    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FetchError::ClientConstruction(format!("cannot build TLS context: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}

#[derive(Debug)]
pub(crate) struct SelfSignedVerifier {
    provider: Arc<CryptoProvider>,
    web: Arc<WebPkiServerVerifier>,
}

impl SelfSignedVerifier {
    pub(crate) fn new(provider: Arc<CryptoProvider>) -> Result<Self, FetchError> {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let web = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(|e| FetchError::ClientConstruction(format!("cannot build certificate verifier: {e}")))?;

        Ok(Self { provider, web })
    }

    /// Verifies `end_entity` with itself as the only trust anchor. This only
    /// succeeds when its issuer is its subject and its signature checks out
    /// under its own key.
    fn verify_self_issued(
        &self,
        end_entity: &CertificateDer<'_>,
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        let mut anchor = RootCertStore::empty();
        anchor.add(CertificateDer::from(end_entity.to_vec()))?;

        WebPkiServerVerifier::builder_with_provider(Arc::new(anchor), self.provider.clone())
            .build()
            .map_err(|e| Error::General(e.to_string()))?
            .verify_server_cert(end_entity, &[], server_name, ocsp_response, now)
    }
}

impl ServerCertVerifier for SelfSignedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        if intermediates.is_empty() {
            match self.verify_self_issued(end_entity, server_name, ocsp_response, now) {
                Ok(verified) => {
                    debug!("accepted self-signed certificate for {server_name:?}");
                    return Ok(verified);
                }
                Err(e) => debug!("not a usable self-signed certificate for {server_name:?}: {e}"),
            }
        }

        self.web
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.web.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.web.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.web.supported_verify_schemes()
    }
}
