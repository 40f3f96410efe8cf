use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inbound-event dedup ledger, unique per (provider, provider_event_id).
///
/// A row is written as soon as signature verification succeeds, before the
/// affected email is even looked up, which is what makes webhook replays
/// idempotent even when no email matches.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "provider_webhook_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub provider: String,
    pub provider_event_id: String,
    pub tenant_id: Option<String>,
    pub signature_valid: bool,
    pub received_at: DateTimeWithTimeZone,
    pub payload_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
