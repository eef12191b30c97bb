use certguard_common::types::{CertificateStatus, CertificateVerdict, DomainRecord};
use chrono::{DateTime, Utc};

/// Folds a probe verdict into a domain record.
///
/// Only the certificate fields move. `last_checked` is the later of its
/// previous value and `now`, so a late-arriving verdict never rewinds it.
pub fn apply_verdict(
    mut record: DomainRecord,
    verdict: &CertificateVerdict,
    now: DateTime<Utc>,
) -> DomainRecord {
    record.certificate_status = CertificateStatus::from_valid(verdict.is_valid);
    record.certificate_issuer = verdict.issuer.clone();
    record.certificate_expiry = verdict.not_after;
    record.last_checked = Some(match record.last_checked {
        Some(prev) if prev > now => prev,
        _ => now,
    });
    record
}
