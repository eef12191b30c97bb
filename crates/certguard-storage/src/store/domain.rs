use certguard_common::types::{CertificateStatus, DomainRecord, DomainSettings};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, QueryFilter,
    QueryOrder,
};

use crate::entities::domain::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::{map_insert_err, Store};

fn to_record(m: domain::Model) -> Result<DomainRecord> {
    let certificate_status = m
        .certificate_status
        .parse::<CertificateStatus>()
        .map_err(|_| StorageError::Corrupt {
            column: "certificate_status",
            value: m.certificate_status.clone(),
        })?;
    Ok(DomainRecord {
        id: m.id,
        domain_name: m.domain_name,
        notification_email: m.notification_email,
        certificate_status,
        certificate_issuer: m.certificate_issuer,
        certificate_expiry: m.certificate_expiry.map(|t| t.with_timezone(&Utc)),
        last_checked: m.last_checked.map(|t| t.with_timezone(&Utc)),
        auto_renewal: m.auto_renewal,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl Store {
    pub async fn list_domains(&self) -> Result<Vec<DomainRecord>> {
        let rows = Entity::find()
            .order_by_asc(Column::Id)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_record).collect()
    }

    pub async fn get_domain_by_id(&self, id: i64) -> Result<Option<DomainRecord>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_record).transpose()
    }

    pub async fn get_domain_by_name(&self, domain_name: &str) -> Result<Option<DomainRecord>> {
        let model = Entity::find()
            .filter(Column::DomainName.eq(domain_name))
            .one(self.db())
            .await?;
        model.map(to_record).transpose()
    }

    /// Inserts a freshly registered domain. The record's `id` is ignored and
    /// assigned by the database.
    pub async fn insert_domain(&self, record: &DomainRecord) -> Result<DomainRecord> {
        let now = Utc::now().fixed_offset();
        let am = domain::ActiveModel {
            domain_name: Set(record.domain_name.clone()),
            notification_email: Set(record.notification_email.clone()),
            certificate_status: Set(record.certificate_status.to_string()),
            certificate_issuer: Set(record.certificate_issuer.clone()),
            certificate_expiry: Set(record.certificate_expiry.map(|t| t.fixed_offset())),
            last_checked: Set(record.last_checked.map(|t| t.fixed_offset())),
            auto_renewal: Set(record.auto_renewal),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = am
            .insert(self.db())
            .await
            .map_err(|e| map_insert_err(e, "domain", &record.domain_name))?;
        to_record(model)
    }

    /// Persists the certificate fields of `record` (status, issuer, expiry,
    /// last checked). Other columns are left alone.
    ///
    /// The write only lands if the stored `last_checked` is not newer than the
    /// record's. A save that lost the race returns the stored row unchanged.
    pub async fn save_domain_status(&self, record: &DomainRecord) -> Result<DomainRecord> {
        let checked = record.last_checked.map(|t| t.fixed_offset());
        let am = domain::ActiveModel {
            certificate_status: Set(record.certificate_status.to_string()),
            certificate_issuer: Set(record.certificate_issuer.clone()),
            certificate_expiry: Set(record.certificate_expiry.map(|t| t.fixed_offset())),
            last_checked: Set(checked),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };
        let not_newer = match checked {
            Some(t) => Condition::any()
                .add(Column::LastChecked.is_null())
                .add(Column::LastChecked.lte(t)),
            None => Condition::all().add(Column::LastChecked.is_null()),
        };
        let res = Entity::update_many()
            .set(am)
            .filter(Column::Id.eq(record.id))
            .filter(not_newer)
            .exec(self.db())
            .await?;

        let stored = self
            .get_domain_by_id(record.id)
            .await?
            .ok_or_else(|| StorageError::not_found("domain", record.id))?;
        if res.rows_affected == 0 {
            tracing::debug!(
                domain = %stored.domain_name,
                stored = ?stored.last_checked,
                stale = ?record.last_checked,
                "Skipped stale certificate status"
            );
        }
        Ok(stored)
    }

    pub async fn update_domain_settings(
        &self,
        id: i64,
        settings: &DomainSettings,
    ) -> Result<DomainRecord> {
        let model = Entity::find_by_id(id)
            .one(self.db())
            .await?
            .ok_or_else(|| StorageError::not_found("domain", id))?;
        let mut am: domain::ActiveModel = model.into();
        if let Some(email) = &settings.notification_email {
            am.notification_email = Set(email.clone());
        }
        if let Some(auto_renewal) = settings.auto_renewal {
            am.auto_renewal = Set(auto_renewal);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        to_record(updated)
    }

    pub async fn toggle_auto_renewal(&self, id: i64) -> Result<DomainRecord> {
        let model = Entity::find_by_id(id)
            .one(self.db())
            .await?
            .ok_or_else(|| StorageError::not_found("domain", id))?;
        let flipped = !model.auto_renewal;
        let mut am: domain::ActiveModel = model.into();
        am.auto_renewal = Set(flipped);
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        to_record(updated)
    }

    pub async fn delete_domain(&self, id: i64) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
