use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit log row, one per accepted lifecycle transition.
/// Never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub email_id: Uuid,
    pub tenant_id: String,
    pub event_type: String,
    pub event_time: DateTimeWithTimeZone,
    pub provider: Option<String>,
    pub provider_event_id: Option<String>,
    pub payload: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
