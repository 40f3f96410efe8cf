use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::enums::BulkStatus;
use crate::models::NewBulkJob;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bulk_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: String,
    pub template_id: String,
    pub total_count: i32,
    pub queued_count: i32,
    pub status: BulkStatus,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<NewBulkJob> for ActiveModel {
    fn from(input: NewBulkJob) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(input.tenant_id),
            template_id: Set(input.template_id),
            total_count: Set(input.total_count),
            queued_count: Set(0),
            status: Set(BulkStatus::Queued),
            created_at: Set(Utc::now().into()),
        }
    }
}
