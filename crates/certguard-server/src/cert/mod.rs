//! Certificate probing and domain status tracking.

pub mod api;
pub mod checker;
pub mod reducer;

use crate::state::AppState;
use certguard_common::types::{CertificateVerdict, DomainRecord};
use certguard_storage::StorageError;
use serde::Serialize;

/// A domain record together with the verdict that produced its status.
#[derive(Debug, Clone, Serialize)]
pub struct CheckedDomain {
    pub domain: DomainRecord,
    pub verdict: CertificateVerdict,
}

/// Probes an already registered domain and persists the reduced status.
pub async fn check_and_store(
    state: &AppState,
    record: DomainRecord,
) -> Result<CheckedDomain, StorageError> {
    let verdict = state.prober.probe(&record.domain_name).await;
    let updated = reducer::apply_verdict(record, &verdict, state.clock.now());
    let saved = state.store.save_domain_status(&updated).await?;
    tracing::info!(
        domain = %saved.domain_name,
        status = %saved.certificate_status,
        remaining_days = verdict.remaining_days,
        "Domain certificate checked"
    );
    Ok(CheckedDomain {
        domain: saved,
        verdict,
    })
}
