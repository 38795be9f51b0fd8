use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create jobs table
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::Action).string().not_null())
                    .col(
                        ColumnDef::new(Jobs::Payload)
                            .json_binary()
                            .not_null()
                            .default("'{}'::jsonb"),
                    )
                    .col(
                        ColumnDef::new(Jobs::Network)
                            .string()
                            .not_null()
                            .default("testnet"),
                    )
                    .col(ColumnDef::new(Jobs::JobType).string().not_null())
                    .col(ColumnDef::new(Jobs::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Jobs::IntervalMinutes).big_integer())
                    .col(
                        ColumnDef::new(Jobs::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Jobs::LastRunAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Jobs::NextRunAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Jobs::ErrorDetails).json_binary())
                    .col(
                        ColumnDef::new(Jobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Jobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_status")
                    .table(Jobs::Table)
                    .col(Jobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_type_status")
                    .table(Jobs::Table)
                    .col(Jobs::JobType)
                    .col(Jobs::Status)
                    .to_owned(),
            )
            .await?;

        // Create job_logs table (append-only log streams)
        manager
            .create_table(
                Table::create()
                    .table(JobLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobLogs::JobId).string().not_null())
                    .col(ColumnDef::new(JobLogs::Source).string().not_null())
                    .col(
                        ColumnDef::new(JobLogs::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(JobLogs::Level).string().not_null())
                    .col(ColumnDef::new(JobLogs::Message).text().not_null())
                    .col(ColumnDef::new(JobLogs::Function).string())
                    .col(ColumnDef::new(JobLogs::DurationMs).big_integer())
                    .col(ColumnDef::new(JobLogs::Details).json_binary())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_logs_job_id_timestamp")
                    .table(JobLogs::Table)
                    .col(JobLogs::JobId)
                    .col(JobLogs::Timestamp)
                    .to_owned(),
            )
            .await?;

        // Create the three snapshot tables
        create_snapshot_table(
            manager,
            WalletSnapshots::Table,
            "idx_wallet_snapshots_entity_network_timestamp",
        )
        .await?;
        create_snapshot_table(
            manager,
            TokenFlowSnapshots::Table,
            "idx_token_flow_snapshots_entity_network_timestamp",
        )
        .await?;
        create_snapshot_table(
            manager,
            NftMovementSnapshots::Table,
            "idx_nft_movement_snapshots_entity_network_timestamp",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NftMovementSnapshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TokenFlowSnapshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WalletSnapshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JobLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

/// The snapshot tables share one shape: append-only rows keyed by
/// (entity_address, network) and read latest-by-timestamp.
async fn create_snapshot_table<T>(
    manager: &SchemaManager<'_>,
    table: T,
    index_name: &str,
) -> Result<(), DbErr>
where
    T: Iden + Copy + 'static,
{
    manager
        .create_table(
            Table::create()
                .table(table)
                .if_not_exists()
                .col(
                    ColumnDef::new(SnapshotColumns::Id)
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(SnapshotColumns::EntityAddress).string().not_null())
                .col(ColumnDef::new(SnapshotColumns::Network).string().not_null())
                .col(
                    ColumnDef::new(SnapshotColumns::Timestamp)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp()),
                )
                .col(
                    ColumnDef::new(SnapshotColumns::Alerts)
                        .json_binary()
                        .not_null()
                        .default("'[]'::jsonb"),
                )
                .col(
                    ColumnDef::new(SnapshotColumns::RiskScore)
                        .integer()
                        .not_null()
                        .default(1),
                )
                .col(
                    ColumnDef::new(SnapshotColumns::AnalysisMetadata)
                        .json_binary()
                        .not_null()
                        .default("'{}'::jsonb"),
                )
                .col(
                    ColumnDef::new(SnapshotColumns::Metrics)
                        .json_binary()
                        .not_null()
                        .default("'{}'::jsonb"),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name(index_name)
                .table(table)
                .col(SnapshotColumns::EntityAddress)
                .col(SnapshotColumns::Network)
                .col(SnapshotColumns::Timestamp)
                .to_owned(),
        )
        .await?;

    Ok(())
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    Action,
    Payload,
    Network,
    JobType,
    ScheduledAt,
    IntervalMinutes,
    Status,
    LastRunAt,
    NextRunAt,
    ErrorDetails,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum JobLogs {
    Table,
    Id,
    JobId,
    Source,
    Timestamp,
    Level,
    Message,
    Function,
    DurationMs,
    Details,
}

#[derive(DeriveIden, Clone, Copy)]
enum WalletSnapshots {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum TokenFlowSnapshots {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum NftMovementSnapshots {
    Table,
}

#[derive(DeriveIden)]
enum SnapshotColumns {
    Id,
    EntityAddress,
    Network,
    Timestamp,
    Alerts,
    RiskScore,
    AnalysisMetadata,
    Metrics,
}
