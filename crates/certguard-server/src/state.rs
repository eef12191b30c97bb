use crate::cert::checker::CertificateProber;
use crate::config::ServerConfig;
use certguard_alert::engine::IncidentEngine;
use certguard_common::clock::Clock;
use certguard_notify::AlertDispatcher;
use certguard_storage::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub prober: Arc<CertificateProber>,
    pub incidents: Arc<IncidentEngine>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wires the prober and incident engine around an opened store.
    pub fn new(
        config: ServerConfig,
        store: Store,
        dispatcher: Arc<dyn AlertDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(store);
        let prober = Arc::new(CertificateProber::new(&config.cert_check, clock.clone())?);
        let incidents = Arc::new(IncidentEngine::new(store.clone(), dispatcher));
        Ok(Self {
            store,
            prober,
            incidents,
            clock,
            config: Arc::new(config),
        })
    }
}
