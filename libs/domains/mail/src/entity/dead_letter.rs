use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Terminal-failure record for operator inspection and replay. Append-only,
/// written exactly once per email that exhausts retries or fails permanently.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dead_letters")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub email_id: Uuid,
    pub tenant_id: String,
    #[sea_orm(column_type = "Text")]
    pub last_error: String,
    pub attempt_count: i32,
    pub moved_at: DateTimeWithTimeZone,
    pub payload: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
