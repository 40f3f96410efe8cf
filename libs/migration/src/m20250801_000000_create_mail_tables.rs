use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tenants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tenants::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tenants::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Tenants::Status)
                            .string_len(32)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        timestamp_with_time_zone(Tenants::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Templates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Templates::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Templates::TenantId).string_len(64).not_null())
                    .col(ColumnDef::new(Templates::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Templates::Version).integer().not_null())
                    .col(text(Templates::SubjectTemplate))
                    .col(text(Templates::HtmlTemplate))
                    .col(text_null(Templates::TextTemplate))
                    .col(
                        ColumnDef::new(Templates::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        timestamp_with_time_zone(Templates::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_templates_tenant")
                            .from(Templates::Table, Templates::TenantId)
                            .to(Tenants::Table, Tenants::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Template identity is (tenant, name, version).
        manager
            .create_index(
                Index::create()
                    .name("uq_templates_tenant_name_version")
                    .table(Templates::Table)
                    .col(Templates::TenantId)
                    .col(Templates::Name)
                    .col(Templates::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Emails::Table)
                    .if_not_exists()
                    .col(pk_uuid(Emails::Id))
                    .col(ColumnDef::new(Emails::TenantId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Emails::IdempotencyKey)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Emails::RecipientEmail)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Emails::RecipientName).string_len(255).null())
                    .col(ColumnDef::new(Emails::TemplateId).string_len(64).not_null())
                    .col(json_binary(Emails::Variables))
                    .col(json_binary(Emails::Metadata))
                    .col(ColumnDef::new(Emails::ProviderName).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Emails::ProviderMessageId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Emails::Status)
                            .string_len(32)
                            .not_null()
                            .default("queued"),
                    )
                    .col(timestamp_with_time_zone_null(Emails::ScheduledAt))
                    .col(timestamp_with_time_zone_null(Emails::SentAt))
                    .col(timestamp_with_time_zone_null(Emails::DeliveredAt))
                    .col(timestamp_with_time_zone_null(Emails::OpenedAt))
                    .col(timestamp_with_time_zone_null(Emails::FailedAt))
                    .col(text_null(Emails::FailureReason))
                    .col(
                        ColumnDef::new(Emails::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(timestamp_with_time_zone_null(Emails::NextRetryAt))
                    .col(
                        timestamp_with_time_zone(Emails::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Emails::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_emails_tenant")
                            .from(Emails::Table, Emails::TenantId)
                            .to(Tenants::Table, Tenants::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_emails_template")
                            .from(Emails::Table, Emails::TemplateId)
                            .to(Templates::Table, Templates::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Sole intake de-duplication invariant: one email per (tenant, key).
        manager
            .create_index(
                Index::create()
                    .name("uq_emails_tenant_idempotency")
                    .table(Emails::Table)
                    .col(Emails::TenantId)
                    .col(Emails::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_emails_status")
                    .table(Emails::Table)
                    .col(Emails::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_emails_provider_message_id")
                    .table(Emails::Table)
                    .col(Emails::ProviderMessageId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailEvents::Table)
                    .if_not_exists()
                    .col(pk_auto(EmailEvents::Id))
                    .col(ColumnDef::new(EmailEvents::EmailId).uuid().not_null())
                    .col(ColumnDef::new(EmailEvents::TenantId).string_len(64).not_null())
                    .col(ColumnDef::new(EmailEvents::EventType).string_len(64).not_null())
                    .col(
                        timestamp_with_time_zone(EmailEvents::EventTime)
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(EmailEvents::Provider).string_len(64).null())
                    .col(
                        ColumnDef::new(EmailEvents::ProviderEventId)
                            .string_len(255)
                            .null(),
                    )
                    .col(json_binary(EmailEvents::Payload))
                    .col(
                        timestamp_with_time_zone(EmailEvents::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_events_email")
                            .from(EmailEvents::Table, EmailEvents::EmailId)
                            .to(Emails::Table, Emails::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_email_events_email_id")
                    .table(EmailEvents::Table)
                    .col(EmailEvents::EmailId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_email_events_tenant_time")
                    .table(EmailEvents::Table)
                    .col(EmailEvents::TenantId)
                    .col(EmailEvents::EventTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProviderWebhookEvents::Table)
                    .if_not_exists()
                    .col(pk_auto(ProviderWebhookEvents::Id))
                    .col(
                        ColumnDef::new(ProviderWebhookEvents::Provider)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderWebhookEvents::ProviderEventId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderWebhookEvents::TenantId)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProviderWebhookEvents::SignatureValid)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(ProviderWebhookEvents::ReceivedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ProviderWebhookEvents::PayloadHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Inbound dedup ledger: one row per (provider, event id), ever.
        manager
            .create_index(
                Index::create()
                    .name("uq_provider_webhook_events_provider_event")
                    .table(ProviderWebhookEvents::Table)
                    .col(ProviderWebhookEvents::Provider)
                    .col(ProviderWebhookEvents::ProviderEventId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BulkJobs::Table)
                    .if_not_exists()
                    .col(pk_uuid(BulkJobs::Id))
                    .col(ColumnDef::new(BulkJobs::TenantId).string_len(64).not_null())
                    .col(ColumnDef::new(BulkJobs::TemplateId).string_len(64).not_null())
                    .col(ColumnDef::new(BulkJobs::TotalCount).integer().not_null())
                    .col(
                        ColumnDef::new(BulkJobs::QueuedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkJobs::Status)
                            .string_len(32)
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        timestamp_with_time_zone(BulkJobs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_bulk_jobs_tenant_id")
                    .table(BulkJobs::Table)
                    .col(BulkJobs::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeadLetters::Table)
                    .if_not_exists()
                    .col(pk_auto(DeadLetters::Id))
                    .col(ColumnDef::new(DeadLetters::EmailId).uuid().not_null())
                    .col(ColumnDef::new(DeadLetters::TenantId).string_len(64).not_null())
                    .col(text(DeadLetters::LastError))
                    .col(ColumnDef::new(DeadLetters::AttemptCount).integer().not_null())
                    .col(
                        timestamp_with_time_zone(DeadLetters::MovedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(json_binary(DeadLetters::Payload))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_dead_letters_email_id")
                    .table(DeadLetters::Table)
                    .col(DeadLetters::EmailId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_dead_letters_tenant_id")
                    .table(DeadLetters::Table)
                    .col(DeadLetters::TenantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeadLetters::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BulkJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProviderWebhookEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Emails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Templates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tenants::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
    Name,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Templates {
    Table,
    Id,
    TenantId,
    Name,
    Version,
    SubjectTemplate,
    HtmlTemplate,
    TextTemplate,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Emails {
    Table,
    Id,
    TenantId,
    IdempotencyKey,
    RecipientEmail,
    RecipientName,
    TemplateId,
    Variables,
    Metadata,
    ProviderName,
    ProviderMessageId,
    Status,
    ScheduledAt,
    SentAt,
    DeliveredAt,
    OpenedAt,
    FailedAt,
    FailureReason,
    AttemptCount,
    NextRetryAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmailEvents {
    Table,
    Id,
    EmailId,
    TenantId,
    EventType,
    EventTime,
    Provider,
    ProviderEventId,
    Payload,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ProviderWebhookEvents {
    Table,
    Id,
    Provider,
    ProviderEventId,
    TenantId,
    SignatureValid,
    ReceivedAt,
    PayloadHash,
}

#[derive(DeriveIden)]
enum BulkJobs {
    Table,
    Id,
    TenantId,
    TemplateId,
    TotalCount,
    QueuedCount,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DeadLetters {
    Table,
    Id,
    EmailId,
    TenantId,
    LastError,
    AttemptCount,
    MovedAt,
    Payload,
}
