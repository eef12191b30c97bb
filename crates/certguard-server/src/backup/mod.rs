//! Backup-run records reported by agents.

pub mod api;
