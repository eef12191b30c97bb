pub mod backup_log;
pub mod domain;
