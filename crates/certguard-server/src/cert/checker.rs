use anyhow::{anyhow, Result};
use certguard_common::clock::Clock;
use certguard_common::types::CertificateVerdict;
use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use crate::config::CertCheckConfig;

pub const DEFAULT_TLS_PORT: u16 = 443;

const SECONDS_PER_DAY: i64 = 86_400;

/// Probes TLS endpoints and judges the temporal validity of the leaf
/// certificate.
///
/// The chain is never verified: an untrusted or self-signed certificate still
/// yields a verdict. Each probe is one connection attempt, closed before the
/// verdict is returned. The prober holds no mutable state.
pub struct CertificateProber {
    connector: TlsConnector,
    timeout: Duration,
    resolve: HashMap<String, SocketAddr>,
    clock: Arc<dyn Clock>,
}

impl CertificateProber {
    pub fn new(cfg: &CertCheckConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| anyhow!("Failed to build TLS client config: {e}"))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier))
        .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
            resolve: cfg.resolve.clone(),
            clock,
        })
    }

    /// Probes `domain` (`host` or `host:port`, port 443 when omitted).
    ///
    /// Never fails: connection problems come back as an invalid verdict
    /// carrying a single `connection failed: ...` entry.
    pub async fn probe(&self, domain: &str) -> CertificateVerdict {
        let target = match Target::parse(domain) {
            Ok(t) => t,
            Err(e) => return CertificateVerdict::connection_failed(domain.trim(), e),
        };
        let address = target.address();

        let leaf = match self.fetch_leaf(&target).await {
            Ok(der) => der,
            Err(e) => {
                tracing::debug!(domain = %address, error = %e, "Certificate probe failed");
                return CertificateVerdict::connection_failed(&address, e);
            }
        };

        let verdict = evaluate(&address, &leaf, self.clock.now());
        tracing::debug!(
            domain = %address,
            is_valid = verdict.is_valid,
            remaining_days = verdict.remaining_days,
            "Certificate probed"
        );
        verdict
    }

    async fn fetch_leaf(&self, target: &Target) -> Result<Vec<u8>> {
        let server_name = ServerName::try_from(target.host.clone())
            .map_err(|e| anyhow!("invalid host name '{}': {e}", target.host))?;

        let connect = async {
            match self.resolve.get(&target.host) {
                Some(addr) => TcpStream::connect(*addr).await,
                None => TcpStream::connect((target.host.as_str(), target.port)).await,
            }
        };
        let tcp = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| anyhow!("connect timed out after {}s", self.timeout.as_secs()))??;

        let tls = tokio::time::timeout(self.timeout, self.connector.connect(server_name, tcp))
            .await
            .map_err(|_| anyhow!("TLS handshake timed out after {}s", self.timeout.as_secs()))??;

        let (_io, conn) = tls.into_inner();
        conn.peer_certificates()
            .and_then(|certs| certs.first())
            .map(|leaf| leaf.as_ref().to_vec())
            .ok_or_else(|| anyhow!("server presented no certificate"))
    }
}

/// Judges a DER-encoded leaf certificate at instant `now`.
pub fn evaluate(domain: &str, der: &[u8], now: DateTime<Utc>) -> CertificateVerdict {
    let cert = match X509Certificate::from_der(der) {
        Ok((_, cert)) => cert,
        Err(e) => return invalid(domain, format!("certificate could not be parsed: {e}")),
    };

    let validity = cert.validity();
    let (Some(not_before), Some(not_after)) = (
        to_utc(validity.not_before),
        to_utc(validity.not_after),
    ) else {
        return invalid(domain, "certificate validity is out of range".to_string());
    };

    let issuer = cert
        .issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut validation_errors = Vec::new();
    if now < not_before {
        validation_errors.push("certificate is not yet valid".to_string());
    }
    if now > not_after {
        validation_errors.push("certificate has expired".to_string());
    }

    CertificateVerdict {
        domain: domain.to_string(),
        issuer,
        not_before: Some(not_before),
        not_after: Some(not_after),
        remaining_days: remaining_days(not_after, now),
        is_valid: validation_errors.is_empty(),
        validation_errors,
    }
}

/// Whole days until `not_after`, rounded toward negative infinity.
pub fn remaining_days(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

fn to_utc(t: ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.timestamp(), 0)
}

fn invalid(domain: &str, reason: String) -> CertificateVerdict {
    CertificateVerdict {
        domain: domain.to_string(),
        issuer: String::new(),
        not_before: None,
        not_after: None,
        remaining_days: 0,
        is_valid: false,
        validation_errors: vec![reason],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
}

impl Target {
    /// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`. A bare IPv6
    /// literal is taken as a host without port.
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(anyhow!("empty host"));
        }

        if let Some(rest) = raw.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| anyhow!("unterminated IPv6 literal '{raw}'"))?;
            let port = match tail {
                "" => DEFAULT_TLS_PORT,
                _ => parse_port(
                    tail.strip_prefix(':')
                        .ok_or_else(|| anyhow!("unexpected text after ']' in '{raw}'"))?,
                )?,
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match raw.matches(':').count() {
            0 => Ok(Self {
                host: raw.to_string(),
                port: DEFAULT_TLS_PORT,
            }),
            1 => {
                let (host, port) = raw.split_once(':').unwrap_or((raw, ""));
                if host.is_empty() {
                    return Err(anyhow!("empty host"));
                }
                Ok(Self {
                    host: host.to_string(),
                    port: parse_port(port)?,
                })
            }
            _ => Ok(Self {
                host: raw.to_string(),
                port: DEFAULT_TLS_PORT,
            }),
        }
    }

    fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(anyhow!("invalid port '{raw}'")),
        Ok(port) => Ok(port),
    }
}

/// Accepts any certificate chain. Only temporal validity is judged.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
