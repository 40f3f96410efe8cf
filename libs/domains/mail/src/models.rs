use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::entity::Email;
use crate::enums::{EmailStatus, EventType};

/// A single recipient of a send request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Recipient {
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
}

/// Fully-validated send request, the intake contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SendRequest {
    #[validate(length(min = 1, max = 64))]
    pub tenant_id: String,
    #[validate(nested)]
    pub recipient: Recipient,
    #[validate(length(min = 1, max = 64))]
    pub template_id: String,
    #[serde(default)]
    pub variables: Value,
    #[serde(default)]
    pub metadata: Value,
    pub provider_hint: Option<String>,
    pub send_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: String,
}

/// Result of an intake call: the stored email plus whether an existing row
/// was reused for the (tenant, idempotency key) pair.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub email: Email,
    pub reused: bool,
}

/// Result of the conflict-tolerant insert underneath intake.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Created(Email),
    Reused(Email),
}

/// Row data for a new email; ids and timestamps are assigned at insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmail {
    pub tenant_id: String,
    pub idempotency_key: String,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub template_id: String,
    pub variables: Value,
    pub metadata: Value,
    pub provider_name: String,
    pub status: EmailStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BulkRecipient {
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
}

/// Bulk fan-out request; each recipient becomes one idempotent send keyed
/// `{idempotency_key}:{recipient}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BulkSendRequest {
    #[validate(length(min = 1, max = 64))]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 64))]
    pub template_id: String,
    #[validate(length(min = 1), nested)]
    pub recipients: Vec<BulkRecipient>,
    #[serde(default)]
    pub shared_variables: Value,
    #[serde(default)]
    pub per_recipient_variables: std::collections::HashMap<String, Value>,
    #[serde(default)]
    pub metadata: Value,
    pub provider_hint: Option<String>,
    pub send_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 64))]
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBulkJob {
    pub tenant_id: String,
    pub template_id: String,
    pub total_count: i32,
}

/// Fields parsed out of an inbound webhook body. The raw body is carried
/// separately for signature verification and event-log storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub email_id: Option<Uuid>,
    #[serde(default)]
    pub provider_message_id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A permitted inbound status transition, per the ingestion rule table.
///
/// | event     | required current status        | new status |
/// |-----------|--------------------------------|------------|
/// | delivered | sent, delivered                | delivered  |
/// | opened    | sent, delivered, opened        | opened     |
/// | failed    | any except opened, delivered   | failed     |
#[derive(Debug, Clone, PartialEq)]
pub enum InboundTransition {
    Delivered,
    Opened,
    Failed { reason: String },
}

impl InboundTransition {
    /// Resolve an inbound event against the current status. `None` means the
    /// event is not permitted from here (or is an unknown type) and must be
    /// ignored without mutation.
    pub fn resolve(event: &InboundEvent, current: EmailStatus) -> Option<Self> {
        match event.event_type.as_str() {
            "delivered" if matches!(current, EmailStatus::Sent | EmailStatus::Delivered) => {
                Some(InboundTransition::Delivered)
            }
            "opened"
                if matches!(
                    current,
                    EmailStatus::Sent | EmailStatus::Delivered | EmailStatus::Opened
                ) =>
            {
                Some(InboundTransition::Opened)
            }
            "failed" if !matches!(current, EmailStatus::Opened | EmailStatus::Delivered) => {
                Some(InboundTransition::Failed {
                    reason: event
                        .reason
                        .clone()
                        .unwrap_or_else(|| "provider_failed".to_string()),
                })
            }
            _ => None,
        }
    }

    /// Statuses the conditional update may transition from. Applied again at
    /// the store level so a race with the outbound path cannot lose updates.
    pub fn permitted_from(&self) -> &'static [EmailStatus] {
        match self {
            InboundTransition::Delivered => &[EmailStatus::Sent, EmailStatus::Delivered],
            InboundTransition::Opened => &[
                EmailStatus::Sent,
                EmailStatus::Delivered,
                EmailStatus::Opened,
            ],
            InboundTransition::Failed { .. } => &[
                EmailStatus::Queued,
                EmailStatus::Scheduled,
                EmailStatus::Processing,
                EmailStatus::Sent,
                EmailStatus::Failed,
            ],
        }
    }

    pub fn new_status(&self) -> EmailStatus {
        match self {
            InboundTransition::Delivered => EmailStatus::Delivered,
            InboundTransition::Opened => EmailStatus::Opened,
            InboundTransition::Failed { .. } => EmailStatus::Failed,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            InboundTransition::Delivered => EventType::Delivered,
            InboundTransition::Opened => EventType::Opened,
            InboundTransition::Failed { .. } => EventType::Failed,
        }
    }
}
