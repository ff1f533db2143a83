use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Synthetic actor id for operations without an attributable human actor.
const SYSTEM_USER_ID: i64 = 0;

/// Tokens forbidden out of the box. Operators extend this set at runtime;
/// nothing is ever removed.
const DEFAULT_BLOCKED: [&str; 5] = ["drop", "rm", "shutdown", "mkfs", "dd"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                schema
                    .create_table_from_entity(VirtualMachines)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                schema
                    .create_table_from_entity(ServiceAccounts)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                schema
                    .create_table_from_entity(BlockedCommands)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                schema
                    .create_table_from_entity(Events)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                schema
                    .create_table_from_entity(Actors)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Seed the System user. It must pass the admin gate so that
        // system-initiated maintenance calls are authorized, and it must be a
        // real Users row so the audit join can resolve actor names.
        let seed_system = sea_orm_migration::sea_query::Query::insert()
            .into_table(Users)
            .columns([
                crate::entities::users::Column::Id,
                crate::entities::users::Column::Name,
                crate::entities::users::Column::WorksHere,
                crate::entities::users::Column::IsAdmin,
            ])
            .values_panic([
                SYSTEM_USER_ID.into(),
                "System".into(),
                true.into(),
                true.into(),
            ])
            .to_owned();
        manager.exec_stmt(seed_system).await?;

        for token in DEFAULT_BLOCKED {
            let seed = sea_orm_migration::sea_query::Query::insert()
                .into_table(BlockedCommands)
                .columns([crate::entities::blocked_commands::Column::Command])
                .values_panic([token.into()])
                .to_owned();
            manager.exec_stmt(seed).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Actors).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BlockedCommands).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ServiceAccounts).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VirtualMachines).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
