use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Duration, Utc};
use domain_mail::analytics::AnalyticsSummary;
use domain_mail::error::MailError;
use domain_mail::repository::TimeBucket;
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub tenant_id: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub group_by: Option<String>,
    pub template_id: Option<String>,
}

pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<AnalyticsSummary>, MailError> {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or_else(|| to - Duration::days(7));
    let bucket = match query.group_by.as_deref() {
        Some("hour") => TimeBucket::Hour,
        Some("day") | None => TimeBucket::Day,
        Some(other) => {
            return Err(MailError::Validation(format!(
                "unsupported group_by {other}"
            )));
        }
    };

    let summary = state
        .analytics
        .summary(&query.tenant_id, from, to, bucket, query.template_id)
        .await?;
    Ok(Json(summary))
}
