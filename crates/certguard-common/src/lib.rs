//! Shared record, verdict and request types for certguard.
//!
//! Persisted records ([`types::DomainRecord`], [`types::BackupRun`]) are kept
//! separate from the validated request types that mutate them, so an inbound
//! body can never overwrite a field its operation does not own.

pub mod clock;
pub mod types;
