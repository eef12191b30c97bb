use crate::error::StorageError;
use crate::store::Store;
use crate::BackupLogStore;
use certguard_common::types::{
    AlertStatus, BackupStatus, CertificateStatus, ConcludeBackupRun, DomainSettings, NewBackupRun,
    NewDomain,
};
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

async fn setup() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let store = Store::new(&url, dir.path()).await.unwrap();
    (dir, store)
}

fn new_domain(name: &str) -> NewDomain {
    NewDomain {
        domain_name: name.to_string(),
        notification_email: "ops@example.com".to_string(),
        auto_renewal: true,
    }
}

fn new_run(ip: &str) -> NewBackupRun {
    NewBackupRun {
        ip: ip.to_string(),
        server_name: "db-01".to_string(),
        start_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap()),
        backup_status: BackupStatus::Ok,
        script_version: "1.4.2".to_string(),
    }
}

#[tokio::test]
async fn insert_and_lookup_domain() {
    let (_dir, store) = setup().await;
    let record = new_domain("example.com").into_record(Utc::now());
    let inserted = store.insert_domain(&record).await.unwrap();
    assert!(inserted.id > 0);
    assert_eq!(inserted.certificate_status, CertificateStatus::Error);

    let by_name = store.get_domain_by_name("example.com").await.unwrap().unwrap();
    assert_eq!(by_name.id, inserted.id);
    let by_id = store.get_domain_by_id(inserted.id).await.unwrap().unwrap();
    assert_eq!(by_id.domain_name, "example.com");
    assert!(store.get_domain_by_id(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_domain_is_reported_as_duplicate() {
    let (_dir, store) = setup().await;
    let record = new_domain("example.com").into_record(Utc::now());
    store.insert_domain(&record).await.unwrap();
    let err = store.insert_domain(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }), "got {err}");
}

#[tokio::test]
async fn save_domain_status_only_touches_certificate_fields() {
    let (_dir, store) = setup().await;
    let inserted = store
        .insert_domain(&new_domain("example.com").into_record(Utc::now()))
        .await
        .unwrap();

    let checked_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut updated = inserted.clone();
    updated.certificate_status = CertificateStatus::Valid;
    updated.certificate_issuer = "R3".to_string();
    updated.certificate_expiry = Some(checked_at + Duration::days(60));
    updated.last_checked = Some(checked_at);
    updated.notification_email = "someone-else@example.com".to_string();

    let saved = store.save_domain_status(&updated).await.unwrap();
    assert_eq!(saved.certificate_status, CertificateStatus::Valid);
    assert_eq!(saved.certificate_issuer, "R3");
    assert_eq!(saved.last_checked, Some(checked_at));
    assert_eq!(saved.notification_email, "ops@example.com");
}

#[tokio::test]
async fn stale_status_save_does_not_move_last_checked_backwards() {
    let (_dir, store) = setup().await;
    let inserted = store
        .insert_domain(&new_domain("example.com").into_record(Utc::now()))
        .await
        .unwrap();
    let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    // Two checks read the same row; the later one saves first.
    let mut earlier = inserted.clone();
    earlier.certificate_status = CertificateStatus::Error;
    earlier.last_checked = Some(t);
    let mut later = inserted.clone();
    later.certificate_status = CertificateStatus::Valid;
    later.certificate_issuer = "R3".to_string();
    later.last_checked = Some(t + Duration::seconds(5));

    store.save_domain_status(&later).await.unwrap();
    let returned = store.save_domain_status(&earlier).await.unwrap();
    assert_eq!(returned.last_checked, Some(t + Duration::seconds(5)));
    assert_eq!(returned.certificate_status, CertificateStatus::Valid);

    let stored = store.get_domain_by_id(inserted.id).await.unwrap().unwrap();
    assert_eq!(stored.last_checked, Some(t + Duration::seconds(5)));
    assert_eq!(stored.certificate_status, CertificateStatus::Valid);
    assert_eq!(stored.certificate_issuer, "R3");

    // An equal or newer check still lands.
    let mut newer = stored.clone();
    newer.certificate_status = CertificateStatus::Error;
    newer.last_checked = Some(t + Duration::seconds(5));
    let saved = store.save_domain_status(&newer).await.unwrap();
    assert_eq!(saved.certificate_status, CertificateStatus::Error);
}

#[tokio::test]
async fn save_domain_status_on_missing_row_is_not_found() {
    let (_dir, store) = setup().await;
    let mut record = new_domain("gone.example.com").into_record(Utc::now());
    record.id = 42;
    let err = store.save_domain_status(&record).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(store.list_domains().await.unwrap().is_empty());
}

#[tokio::test]
async fn domain_settings_and_toggle() {
    let (_dir, store) = setup().await;
    let inserted = store
        .insert_domain(&new_domain("example.com").into_record(Utc::now()))
        .await
        .unwrap();

    let settings = DomainSettings {
        notification_email: Some("new@example.com".to_string()),
        auto_renewal: None,
    };
    let updated = store.update_domain_settings(inserted.id, &settings).await.unwrap();
    assert_eq!(updated.notification_email, "new@example.com");
    assert!(updated.auto_renewal);

    let toggled = store.toggle_auto_renewal(inserted.id).await.unwrap();
    assert!(!toggled.auto_renewal);

    assert!(store.delete_domain(inserted.id).await.unwrap());
    assert!(!store.delete_domain(inserted.id).await.unwrap());
    assert!(store.toggle_auto_renewal(inserted.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn latest_backup_run_by_ip_picks_newest() {
    let (_dir, store) = setup().await;
    store.insert_backup_run(&new_run("10.0.0.5")).await.unwrap();
    let second = store.insert_backup_run(&new_run("10.0.0.5")).await.unwrap();
    store.insert_backup_run(&new_run("10.0.0.6")).await.unwrap();

    let latest = store.latest_backup_run_by_ip("10.0.0.5").await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert!(latest.is_running());
    assert_eq!(latest.alert_status, AlertStatus::None);
    assert!(store.latest_backup_run_by_ip("10.9.9.9").await.unwrap().is_none());

    let all = store.list_backup_runs().await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[0].id > all[1].id);
}

#[tokio::test]
async fn conclude_is_compare_and_set_on_alert_status() {
    let (_dir, store) = setup().await;
    let run = store.insert_backup_run(&new_run("10.0.0.5")).await.unwrap();
    let update = ConcludeBackupRun {
        end_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap()),
        backup_status: BackupStatus::Failed,
    };

    let won = store
        .conclude_backup_run(run.id, &update, AlertStatus::SendFailed, AlertStatus::None)
        .await
        .unwrap();
    assert!(won);

    // A second claimer expecting `None` must lose.
    let lost = store
        .conclude_backup_run(run.id, &update, AlertStatus::SendFailed, AlertStatus::None)
        .await
        .unwrap();
    assert!(!lost);

    let stored = store.get_backup_run(run.id).await.unwrap().unwrap();
    assert_eq!(stored.alert_status, AlertStatus::SendFailed);
    assert_eq!(stored.backup_status, BackupStatus::Failed);
    assert_eq!(stored.end_time, update.end_time);
    assert_eq!(stored.ip, "10.0.0.5");
    assert_eq!(stored.server_name, "db-01");
    assert_eq!(stored.start_time, run.start_time);
}

#[tokio::test]
async fn transition_alert_status_requires_expected_source() {
    let (_dir, store) = setup().await;
    let run = store.insert_backup_run(&new_run("10.0.0.5")).await.unwrap();

    let moved = store
        .transition_alert_status(run.id, AlertStatus::SendFailed, AlertStatus::Sent)
        .await
        .unwrap();
    assert!(!moved);

    let moved = store
        .transition_alert_status(run.id, AlertStatus::None, AlertStatus::Sent)
        .await
        .unwrap();
    assert!(moved);
    let stored = store.get_backup_run(run.id).await.unwrap().unwrap();
    assert_eq!(stored.alert_status, AlertStatus::Sent);
}

#[tokio::test]
async fn conclude_on_missing_row_writes_nothing() {
    let (_dir, store) = setup().await;
    let update = ConcludeBackupRun {
        end_time: None,
        backup_status: BackupStatus::Ok,
    };
    let written = store
        .conclude_backup_run(77, &update, AlertStatus::None, AlertStatus::None)
        .await
        .unwrap();
    assert!(!written);
    assert!(store.list_backup_runs().await.unwrap().is_empty());
}
