//! Delivery analytics: status totals, derived rates, and a bucketed event
//! series, all simple grouping queries over persisted rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::enums::EmailStatus;
use crate::error::MailResult;
use crate::repository::{EventBucket, MailRepository, TimeBucket};

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub totals: HashMap<String, i64>,
    pub rates: AnalyticsRates,
    pub series: Vec<EventBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsRates {
    pub delivery_rate: f64,
    pub open_rate: f64,
}

#[derive(Clone)]
pub struct AnalyticsService {
    repo: Arc<dyn MailRepository>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn MailRepository>) -> Self {
        Self { repo }
    }

    pub async fn summary(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: TimeBucket,
        template_id: Option<String>,
    ) -> MailResult<AnalyticsSummary> {
        let rows = self
            .repo
            .status_totals(tenant_id, from, to, template_id)
            .await?;
        let totals: HashMap<String, i64> = rows
            .iter()
            .map(|(status, count)| (status.to_string(), *count))
            .collect();

        let series = self.repo.event_series(tenant_id, from, to, bucket).await?;

        Ok(AnalyticsSummary {
            rates: compute_rates(&rows),
            totals,
            series,
        })
    }
}

/// Later statuses imply earlier ones: an opened email was delivered, a
/// delivered email was sent.
fn compute_rates(totals: &[(EmailStatus, i64)]) -> AnalyticsRates {
    let count = |status: EmailStatus| -> i64 {
        totals
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    };

    let opened = count(EmailStatus::Opened);
    let delivered = count(EmailStatus::Delivered) + opened;
    let sent = count(EmailStatus::Sent) + delivered;

    AnalyticsRates {
        delivery_rate: if sent > 0 {
            delivered as f64 / sent as f64
        } else {
            0.0
        },
        open_rate: if delivered > 0 {
            opened as f64 / delivered as f64
        } else {
            0.0
        },
    }
}
