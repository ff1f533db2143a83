use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::Serialize;

use crate::entities::{actors, events, prelude::*, users};

/// One row of the audit trail as callers see it: what happened, when, and
/// the display name of the actor it is attributed to.
#[derive(Debug, Clone, FromQueryResult, Serialize)]
pub struct AuditEntry {
    pub description: String,
    pub timestamp: i64,
    pub actor_name: String,
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append one event row plus one actor row per id. The event id comes
    /// back from the insert directly.
    pub async fn append(
        &self,
        description: &str,
        timestamp: i64,
        actor_ids: &[i64],
    ) -> Result<i64> {
        let event = events::ActiveModel {
            description: Set(description.to_string()),
            timestamp: Set(timestamp),
            ..Default::default()
        };

        let event = event
            .insert(&self.conn)
            .await
            .context("Failed to insert audit event")?;

        let actor_rows: Vec<actors::ActiveModel> = actor_ids
            .iter()
            .map(|actor_id| actors::ActiveModel {
                event_id: Set(event.id),
                actor_id: Set(*actor_id),
                ..Default::default()
            })
            .collect();

        if !actor_rows.is_empty() {
            Actors::insert_many(actor_rows)
                .exec(&self.conn)
                .await
                .context("Failed to insert audit actors")?;
        }

        Ok(event.id)
    }

    /// Events at or after the given epoch second, ascending by timestamp,
    /// one row per (event, actor) pair.
    pub async fn since(&self, timestamp: i64) -> Result<Vec<AuditEntry>> {
        Events::find()
            .select_only()
            .column(events::Column::Description)
            .column(events::Column::Timestamp)
            .column_as(users::Column::Name, "actor_name")
            .join(JoinType::InnerJoin, events::Relation::Actors.def())
            .join(JoinType::InnerJoin, actors::Relation::Users.def())
            .filter(events::Column::Timestamp.gte(timestamp))
            .order_by_asc(events::Column::Timestamp)
            .into_model::<AuditEntry>()
            .all(&self.conn)
            .await
            .context("Failed to query audit trail")
    }
}
