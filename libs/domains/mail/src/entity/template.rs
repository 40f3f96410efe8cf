use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Template row. Unique per (tenant, name, version); only active versions
/// are dispatchable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub version: i32,
    #[sea_orm(column_type = "Text")]
    pub subject_template: String,
    #[sea_orm(column_type = "Text")]
    pub html_template: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub text_template: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
