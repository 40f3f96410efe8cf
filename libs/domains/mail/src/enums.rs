use sea_orm::{DeriveActiveEnum, EnumIter, sea_query::StringLen};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Tenant lifecycle status. Only active tenants may intake sends.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "disabled")]
    Disabled,
}

/// Email delivery status.
///
/// Outbound transitions (`queued`/`scheduled` → `processing` → `sent` |
/// `failed`) are driven by the delivery state machine; inbound transitions
/// (`sent` → `delivered` → `opened`, plus `failed`) by webhook ingestion.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailStatus {
    #[default]
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "opened")]
    Opened,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl EmailStatus {
    /// Statuses a processing attempt may claim from.
    ///
    /// `Processing` is deliberately part of the set: a worker that died after
    /// claiming leaves the row here, and redelivery must be able to re-drive
    /// it. The cost is that two live redeliveries can both claim an in-flight
    /// email; outbound transitions compare-and-set on `Processing` so at most
    /// one of them lands a terminal state change.
    pub const CLAIMABLE: [EmailStatus; 3] = [
        EmailStatus::Queued,
        EmailStatus::Scheduled,
        EmailStatus::Processing,
    ];

    /// Once dispatch succeeded, redelivered jobs must not touch the email.
    pub fn is_terminal_outbound(&self) -> bool {
        matches!(
            self,
            EmailStatus::Sent | EmailStatus::Delivered | EmailStatus::Opened
        )
    }
}

/// Audit-log event types, one per accepted lifecycle transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    Queued,
    Sent,
    Delivered,
    Opened,
    Failed,
    RetryScheduled,
    DeadLettered,
}

/// Bulk fan-out job status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BulkStatus {
    #[default]
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_email_status_string_round_trip() {
        assert_eq!(EmailStatus::Processing.to_string(), "processing");
        assert_eq!(EmailStatus::from_str("sent").unwrap(), EmailStatus::Sent);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::RetryScheduled.to_string(), "retry_scheduled");
        assert_eq!(EventType::DeadLettered.to_string(), "dead_lettered");
    }

    #[test]
    fn test_terminal_outbound() {
        assert!(EmailStatus::Sent.is_terminal_outbound());
        assert!(EmailStatus::Opened.is_terminal_outbound());
        assert!(!EmailStatus::Failed.is_terminal_outbound());
        assert!(!EmailStatus::Processing.is_terminal_outbound());
    }

    #[test]
    fn test_claimable_set() {
        assert!(EmailStatus::CLAIMABLE.contains(&EmailStatus::Processing));
        assert!(!EmailStatus::CLAIMABLE.contains(&EmailStatus::Failed));
    }
}
