use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "domains")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub domain_name: String,
    pub notification_email: String,
    pub certificate_status: String,
    pub certificate_issuer: String,
    pub certificate_expiry: Option<DateTimeWithTimeZone>,
    pub last_checked: Option<DateTimeWithTimeZone>,
    pub auto_renewal: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
