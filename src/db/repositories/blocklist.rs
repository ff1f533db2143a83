use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::{blocked_commands, prelude::*};

pub struct BlocklistRepository {
    conn: DatabaseConnection,
}

impl BlocklistRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn all(&self) -> Result<Vec<String>> {
        let rows = BlockedCommands::find()
            .all(&self.conn)
            .await
            .context("Failed to load blocked commands")?;

        Ok(rows.into_iter().map(|row| row.command).collect())
    }

    pub async fn add(&self, command: &str) -> Result<()> {
        let active = blocked_commands::ActiveModel {
            command: Set(command.to_string()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert blocked command")?;

        Ok(())
    }
}
