// Shared transport configuration for the session API and the video stream.
//
// The HTTPS client (reqwest) and the raw TLS stream (tokio-rustls) are
// built from here so timeout and trust settings live in one place.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Trust mode for the raw stream's TLS session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Verify the server chain against the bundled webpki roots.
    #[default]
    Verified,
    /// Accept any certificate. The stream servers present a private chain
    /// that public roots do not cover.
    DangerAcceptInvalid,
}

impl TlsMode {
    pub fn from_insecure(insecure_skip_verify: bool) -> Self {
        if insecure_skip_verify {
            Self::DangerAcceptInvalid
        } else {
            Self::Verified
        }
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout applied to every session API call.
    pub timeout: Duration,
    /// Trust mode for the video stream.
    pub stream_tls: TlsMode,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            stream_tls: TlsMode::Verified,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` carrying the fixed Blink header set.
    pub fn build_client(&self, token: &SecretString) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent("liveview/0.1.0")
            .default_headers(api_headers(token)?)
            .build()
            .map_err(Error::Http)
    }

    /// Build the rustls config used for the raw stream.
    pub fn stream_tls_config(&self) -> Result<rustls::ClientConfig, Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(format!("unsupported protocol versions: {e}")))?;

        let config = match self.stream_tls {
            TlsMode::Verified => {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                builder.with_root_certificates(roots).with_no_client_auth()
            }
            TlsMode::DangerAcceptInvalid => {
                tracing::warn!("stream TLS certificate verification is disabled");
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
                    .with_no_client_auth()
            }
        };
        Ok(config)
    }
}

/// The header set every session API call carries.
pub fn api_headers(token: &SecretString) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("locale"), HeaderValue::from_static("en_US"));

    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
        .map_err(|_| Error::InvalidToken)?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=UTF-8"),
    );
    Ok(headers)
}

// ── Accept-any verifier ──────────────────────────────────────────────

/// Skips chain and hostname checks but still validates handshake
/// signatures with the provider's algorithms.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.stream_tls, TlsMode::Verified);
    }

    #[test]
    fn insecure_flag_maps_to_mode() {
        assert_eq!(TlsMode::from_insecure(false), TlsMode::Verified);
        assert_eq!(TlsMode::from_insecure(true), TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn api_headers_are_complete() {
        let headers = api_headers(&SecretString::from("tok-123".to_string())).unwrap();
        assert_eq!(headers["locale"], "en_US");
        assert_eq!(headers[AUTHORIZATION], "Bearer tok-123");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[CONTENT_TYPE], "application/json; charset=UTF-8");
    }

    #[test]
    fn stream_tls_config_builds_in_both_modes() {
        for mode in [TlsMode::Verified, TlsMode::DangerAcceptInvalid] {
            let config = TransportConfig {
                stream_tls: mode,
                ..TransportConfig::default()
            };
            assert!(config.stream_tls_config().is_ok());
        }
    }
}
