//! PostgreSQL implementation of the persistence boundary.
//!
//! Transition methods run as short transactions: a conditional
//! `update_many` guarded on the expected current status, then the audit
//! event (and dead letter, where applicable), committed together. A guard
//! mismatch rolls back by dropping the transaction, so rejected transitions
//! leave no trace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, QuerySelect, SqlErr, Statement, TransactionTrait,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entity::{bulk_job, dead_letter, email, email_event, template, tenant, webhook_event};
use crate::entity::{BulkJob, Email, EmailEvent, Template, Tenant};
use crate::enums::{BulkStatus, EmailStatus, EventType, TenantStatus};
use crate::error::{MailError, MailResult};
use crate::models::{InboundTransition, InsertOutcome, NewBulkJob, NewEmail};
use crate::repository::{EventBucket, MailRepository, TimeBucket};

pub struct PgMailRepository {
    db: DatabaseConnection,
}

impl PgMailRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn append_event(
        txn: &DatabaseTransaction,
        email: &Email,
        event_type: EventType,
        provider_event_id: Option<String>,
        payload: Value,
    ) -> MailResult<()> {
        let now = Utc::now();
        let event = email_event::ActiveModel {
            email_id: Set(email.id),
            tenant_id: Set(email.tenant_id.clone()),
            event_type: Set(event_type.to_string()),
            event_time: Set(now.into()),
            provider: Set(Some(email.provider_name.clone())),
            provider_event_id: Set(provider_event_id),
            payload: Set(payload),
            created_at: Set(now.into()),
            ..Default::default()
        };
        email_event::Entity::insert(event).exec(txn).await?;
        Ok(())
    }
}

#[async_trait]
impl MailRepository for PgMailRepository {
    async fn find_active_tenant(&self, tenant_id: &str) -> MailResult<Option<Tenant>> {
        let found = tenant::Entity::find_by_id(tenant_id)
            .filter(tenant::Column::Status.eq(TenantStatus::Active))
            .one(&self.db)
            .await?;
        Ok(found)
    }

    async fn find_active_template(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> MailResult<Option<Template>> {
        let found = template::Entity::find_by_id(template_id)
            .filter(template::Column::TenantId.eq(tenant_id))
            .filter(template::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        Ok(found)
    }

    async fn find_template(&self, template_id: &str) -> MailResult<Option<Template>> {
        let found = template::Entity::find_by_id(template_id).one(&self.db).await?;
        Ok(found)
    }

    async fn find_email(&self, email_id: Uuid) -> MailResult<Option<Email>> {
        let found = email::Entity::find_by_id(email_id).one(&self.db).await?;
        Ok(found)
    }

    async fn find_email_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> MailResult<Option<Email>> {
        let found = email::Entity::find()
            .filter(email::Column::ProviderMessageId.eq(provider_message_id))
            .one(&self.db)
            .await?;
        Ok(found)
    }

    async fn insert_email(&self, new_email: NewEmail) -> MailResult<InsertOutcome> {
        let tenant_id = new_email.tenant_id.clone();
        let idempotency_key = new_email.idempotency_key.clone();
        let scheduled = new_email.scheduled_at.is_some();

        let txn = self.db.begin().await?;
        let active: email::ActiveModel = new_email.into();
        let inserted = email::Entity::insert(active).exec_with_returning(&txn).await;

        match inserted {
            Ok(created) => {
                Self::append_event(
                    &txn,
                    &created,
                    EventType::Queued,
                    None,
                    json!({ "scheduled": scheduled }),
                )
                .await?;
                txn.commit().await?;
                info!(email_id = %created.id, tenant_id = %created.tenant_id, "Created email");
                Ok(InsertOutcome::Created(created))
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // Lost the race (or the caller retransmitted): the unique
                // index guarantees exactly one row exists, read it back.
                drop(txn);
                let existing = email::Entity::find()
                    .filter(email::Column::TenantId.eq(&tenant_id))
                    .filter(email::Column::IdempotencyKey.eq(&idempotency_key))
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| {
                        MailError::Database(
                            "email vanished after idempotency conflict".to_string(),
                        )
                    })?;
                debug!(email_id = %existing.id, tenant_id, "Reusing email for idempotency key");
                Ok(InsertOutcome::Reused(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_for_processing(&self, email_id: Uuid) -> MailResult<bool> {
        let result = email::Entity::update_many()
            .col_expr(email::Column::Status, Expr::value(EmailStatus::Processing))
            .col_expr(
                email::Column::UpdatedAt,
                Expr::value(sea_orm::Value::from(Utc::now())),
            )
            .filter(email::Column::Id.eq(email_id))
            .filter(email::Column::Status.is_in(EmailStatus::CLAIMABLE))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_sent(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        provider_message_id: &str,
        event_payload: Value,
    ) -> MailResult<bool> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let Some(current) = email::Entity::find_by_id(email_id).one(&txn).await? else {
            return Ok(false);
        };

        let result = email::Entity::update_many()
            .col_expr(email::Column::Status, Expr::value(EmailStatus::Sent))
            .col_expr(email::Column::SentAt, Expr::value(sea_orm::Value::from(now)))
            .col_expr(
                email::Column::ProviderMessageId,
                Expr::value(provider_message_id.to_string()),
            )
            .col_expr(
                email::Column::FailureReason,
                Expr::value(sea_orm::Value::String(None)),
            )
            .col_expr(email::Column::AttemptCount, Expr::value(attempt_count))
            .col_expr(email::Column::UpdatedAt, Expr::value(sea_orm::Value::from(now)))
            .filter(email::Column::Id.eq(email_id))
            .filter(email::Column::Status.eq(EmailStatus::Processing))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            warn!(email_id = %email_id, "mark_sent guard miss, another path moved the email");
            return Ok(false);
        }

        Self::append_event(&txn, &current, EventType::Sent, None, event_payload).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn schedule_retry(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        delay_seconds: u64,
        failure_reason: Option<String>,
        event_payload: Value,
    ) -> MailResult<bool> {
        let now = Utc::now();
        let next_retry_at = now + chrono::Duration::seconds(delay_seconds as i64);
        let txn = self.db.begin().await?;

        let Some(current) = email::Entity::find_by_id(email_id).one(&txn).await? else {
            return Ok(false);
        };

        let result = email::Entity::update_many()
            .col_expr(email::Column::Status, Expr::value(EmailStatus::Queued))
            .col_expr(
                email::Column::FailureReason,
                Expr::value(sea_orm::Value::String(failure_reason.map(Box::new))),
            )
            .col_expr(
                email::Column::NextRetryAt,
                Expr::value(sea_orm::Value::from(next_retry_at)),
            )
            .col_expr(email::Column::AttemptCount, Expr::value(attempt_count))
            .col_expr(email::Column::UpdatedAt, Expr::value(sea_orm::Value::from(now)))
            .filter(email::Column::Id.eq(email_id))
            .filter(email::Column::Status.eq(EmailStatus::Processing))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            warn!(email_id = %email_id, "schedule_retry guard miss, another path moved the email");
            return Ok(false);
        }

        Self::append_event(&txn, &current, EventType::RetryScheduled, None, event_payload)
            .await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn mark_failed(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        reason: &str,
        event_payload: Value,
    ) -> MailResult<bool> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let Some(current) = email::Entity::find_by_id(email_id).one(&txn).await? else {
            return Ok(false);
        };

        let result = email::Entity::update_many()
            .col_expr(email::Column::Status, Expr::value(EmailStatus::Failed))
            .col_expr(email::Column::FailedAt, Expr::value(sea_orm::Value::from(now)))
            .col_expr(
                email::Column::FailureReason,
                Expr::value(reason.to_string()),
            )
            .col_expr(email::Column::AttemptCount, Expr::value(attempt_count))
            .col_expr(email::Column::UpdatedAt, Expr::value(sea_orm::Value::from(now)))
            .filter(email::Column::Id.eq(email_id))
            .filter(email::Column::Status.eq(EmailStatus::Processing))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            warn!(email_id = %email_id, "mark_failed guard miss, another path moved the email");
            return Ok(false);
        }

        Self::append_event(&txn, &current, EventType::Failed, None, event_payload).await?;

        let dead_letter = dead_letter::ActiveModel {
            email_id: Set(current.id),
            tenant_id: Set(current.tenant_id.clone()),
            last_error: Set(reason.to_string()),
            attempt_count: Set(attempt_count),
            moved_at: Set(now.into()),
            payload: Set(json!({ "provider": current.provider_name })),
            ..Default::default()
        };
        dead_letter::Entity::insert(dead_letter).exec(&txn).await?;

        Self::append_event(
            &txn,
            &current,
            EventType::DeadLettered,
            None,
            json!({ "reason": reason }),
        )
        .await?;

        txn.commit().await?;
        info!(email_id = %email_id, attempt_count, "Email dead-lettered");
        Ok(true)
    }

    async fn record_webhook_event(
        &self,
        provider: &str,
        provider_event_id: &str,
        tenant_id: Option<String>,
        payload_hash: &str,
    ) -> MailResult<bool> {
        let record = webhook_event::ActiveModel {
            provider: Set(provider.to_string()),
            provider_event_id: Set(provider_event_id.to_string()),
            tenant_id: Set(tenant_id),
            signature_valid: Set(true),
            received_at: Set(Utc::now().into()),
            payload_hash: Set(payload_hash.to_string()),
            ..Default::default()
        };

        match webhook_event::Entity::insert(record).exec(&self.db).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_inbound_transition(
        &self,
        email_id: Uuid,
        transition: InboundTransition,
        provider: &str,
        provider_event_id: &str,
        event_payload: Value,
    ) -> MailResult<bool> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let Some(current) = email::Entity::find_by_id(email_id).one(&txn).await? else {
            return Ok(false);
        };

        let mut update = email::Entity::update_many()
            .col_expr(
                email::Column::Status,
                Expr::value(transition.new_status()),
            )
            .col_expr(email::Column::UpdatedAt, Expr::value(sea_orm::Value::from(now)));

        update = match &transition {
            InboundTransition::Delivered => update.col_expr(
                email::Column::DeliveredAt,
                Expr::value(sea_orm::Value::from(now)),
            ),
            InboundTransition::Opened => update.col_expr(
                email::Column::OpenedAt,
                Expr::value(sea_orm::Value::from(now)),
            ),
            InboundTransition::Failed { reason } => update
                .col_expr(email::Column::FailedAt, Expr::value(sea_orm::Value::from(now)))
                .col_expr(email::Column::FailureReason, Expr::value(reason.clone())),
        };

        let result = update
            .filter(email::Column::Id.eq(email_id))
            .filter(email::Column::Status.is_in(transition.permitted_from().iter().copied()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Ok(false);
        }

        let mut event = current.clone();
        event.provider_name = provider.to_string();
        Self::append_event(
            &txn,
            &event,
            transition.event_type(),
            Some(provider_event_id.to_string()),
            event_payload,
        )
        .await?;

        txn.commit().await?;
        Ok(true)
    }

    async fn insert_bulk_job(&self, job: NewBulkJob) -> MailResult<BulkJob> {
        let active: bulk_job::ActiveModel = job.into();
        let created = bulk_job::Entity::insert(active)
            .exec_with_returning(&self.db)
            .await?;
        Ok(created)
    }

    async fn find_bulk_job(&self, bulk_id: Uuid) -> MailResult<Option<BulkJob>> {
        let found = bulk_job::Entity::find_by_id(bulk_id).one(&self.db).await?;
        Ok(found)
    }

    async fn update_bulk_job(
        &self,
        bulk_id: Uuid,
        status: BulkStatus,
        queued_count: i32,
    ) -> MailResult<bool> {
        let result = bulk_job::Entity::update_many()
            .col_expr(bulk_job::Column::Status, Expr::value(status))
            .col_expr(bulk_job::Column::QueuedCount, Expr::value(queued_count))
            .filter(bulk_job::Column::Id.eq(bulk_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn list_events(&self, email_id: Uuid) -> MailResult<Vec<EmailEvent>> {
        let events = email_event::Entity::find()
            .filter(email_event::Column::EmailId.eq(email_id))
            .order_by_asc(email_event::Column::Id)
            .all(&self.db)
            .await?;
        Ok(events)
    }

    async fn status_totals(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        template_id: Option<String>,
    ) -> MailResult<Vec<(EmailStatus, i64)>> {
        let mut query = email::Entity::find()
            .select_only()
            .column(email::Column::Status)
            .column_as(email::Column::Id.count(), "count")
            .filter(email::Column::TenantId.eq(tenant_id))
            .filter(email::Column::CreatedAt.gte(from))
            .filter(email::Column::CreatedAt.lte(to));

        if let Some(template_id) = template_id {
            query = query.filter(email::Column::TemplateId.eq(template_id));
        }

        let rows: Vec<(EmailStatus, i64)> = query
            .group_by(email::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn event_series(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: TimeBucket,
    ) -> MailResult<Vec<EventBucket>> {
        #[derive(FromQueryResult)]
        struct Row {
            bucket: DateTime<Utc>,
            event_type: String,
            count: i64,
        }

        let rows = Row::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT date_trunc($1, event_time) AS bucket, event_type, COUNT(id) AS count
               FROM email_events
               WHERE tenant_id = $2 AND event_time >= $3 AND event_time <= $4
               GROUP BY bucket, event_type
               ORDER BY bucket"#,
            [
                bucket.as_str().into(),
                tenant_id.into(),
                from.into(),
                to.into(),
            ],
        ))
        .all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EventBucket {
                bucket: row.bucket,
                event_type: row.event_type,
                count: row.count,
            })
            .collect())
    }
}
