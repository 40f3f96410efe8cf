use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::enums::EmailStatus;
use crate::models::NewEmail;

/// The central delivery record.
///
/// Owned by the delivery state machine for outbound transitions and by
/// webhook ingestion for inbound ones; both sides mutate it through
/// conditional updates keyed on the current status.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emails")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: String,
    pub idempotency_key: String,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub template_id: String,
    pub variables: Json,
    pub metadata: Json,
    pub provider_name: String,
    pub provider_message_id: Option<String>,
    pub status: EmailStatus,
    pub scheduled_at: Option<DateTimeWithTimeZone>,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub delivered_at: Option<DateTimeWithTimeZone>,
    pub opened_at: Option<DateTimeWithTimeZone>,
    pub failed_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub failure_reason: Option<String>,
    pub attempt_count: i32,
    pub next_retry_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<NewEmail> for ActiveModel {
    fn from(input: NewEmail) -> Self {
        let now = Utc::now();
        ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(input.tenant_id),
            idempotency_key: Set(input.idempotency_key),
            recipient_email: Set(input.recipient_email),
            recipient_name: Set(input.recipient_name),
            template_id: Set(input.template_id),
            variables: Set(input.variables),
            metadata: Set(input.metadata),
            provider_name: Set(input.provider_name),
            provider_message_id: Set(None),
            status: Set(input.status),
            scheduled_at: Set(input.scheduled_at.map(Into::into)),
            sent_at: Set(None),
            delivered_at: Set(None),
            opened_at: Set(None),
            failed_at: Set(None),
            failure_reason: Set(None),
            attempt_count: Set(0),
            next_retry_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }
}
