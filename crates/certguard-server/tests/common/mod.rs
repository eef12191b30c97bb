#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use certguard_common::clock::ManualClock;
use certguard_notify::{EmailConfig, EmailDispatcher};
use certguard_server::app;
use certguard_server::config::ServerConfig;
use certguard_server::state::AppState;
use certguard_storage::Store;
use chrono::{DateTime, TimeZone, Utc};
use lettre::transport::stub::AsyncStubTransport;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::util::ServiceExt;

pub const TEST_ISSUER_CN: &str = "Certguard Test CA";
pub const ALERT_RECIPIENTS: [&str; 2] = ["ops@example.com", "oncall@example.com"];

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
    pub mail: AsyncStubTransport,
    pub clock: Arc<ManualClock>,
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn email_config() -> EmailConfig {
    EmailConfig {
        smtp_host: "smtp.example.com".to_string(),
        from_address: "certguard@example.com".to_string(),
        to_addresses: ALERT_RECIPIENTS.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// Builds the app around a temp SQLite store, a stub mail transport and a
/// clock pinned at [`fixed_now`].
pub async fn build_test_context(mut config: ServerConfig) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    config.database.data_dir = temp_dir.path().to_string_lossy().to_string();
    config.cert_check.connect_timeout_secs = 2;

    let store = Store::new(
        &config.database.connection_url(),
        temp_dir.path(),
    )
    .await?;
    let mail = AsyncStubTransport::new_ok();
    let dispatcher = Arc::new(EmailDispatcher::with_transport(&config.email, mail.clone())?);
    let clock = Arc::new(ManualClock::new(fixed_now()));

    let state = AppState::new(config, store, dispatcher, clock.clone())?;
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
        mail,
        clock,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    let req = match body {
        Some(body) => builder.body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

/// Leaf certificate for `host`, signed by a throwaway CA named
/// [`TEST_ISSUER_CN`], valid between the given dates.
pub fn mint_certificate(
    host: &str,
    not_before: (i32, u8, u8),
    not_after: (i32, u8, u8),
) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params
        .distinguished_name
        .push(DnType::CommonName, TEST_ISSUER_CN);
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca_key = KeyPair::generate().unwrap();
    let issuer = Issuer::from_params(&ca_params, &ca_key);

    let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, host);
    params
        .extended_key_usages
        .push(ExtendedKeyUsagePurpose::ServerAuth);
    params.not_before = rcgen::date_time_ymd(not_before.0, not_before.1, not_before.2);
    params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
    let key = KeyPair::generate().unwrap();
    let cert = params.signed_by(&key, &issuer).unwrap();

    (
        cert.der().clone(),
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
    )
}

/// Serves TLS with the given certificate on an ephemeral localhost port
/// until the test runtime shuts down.
pub async fn spawn_tls_server(
    cert: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
) -> SocketAddr {
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert], key)
    .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(tcp).await {
                    let mut buf = [0u8; 64];
                    let _ = tls.read(&mut buf).await;
                }
            });
        }
    });
    addr
}

/// Config whose `resolve` table points `host` at `addr`.
pub fn config_resolving(host: &str, addr: SocketAddr) -> ServerConfig {
    let mut config = ServerConfig {
        email: email_config(),
        ..Default::default()
    };
    config.cert_check.resolve.insert(host.to_string(), addr);
    config
}
