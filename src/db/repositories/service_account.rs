use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::{Expr, Func},
};

use crate::entities::{prelude::*, service_accounts};

pub struct ServiceAccountRepository {
    conn: DatabaseConnection,
}

impl ServiceAccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn link(
        &self,
        user_id: i64,
        username: &str,
        service_id: &str,
        service: &str,
    ) -> Result<service_accounts::Model> {
        let active = service_accounts::ActiveModel {
            user_id: Set(user_id),
            username: Set(username.to_string()),
            service_id: Set(service_id.to_string()),
            service: Set(service.to_string()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert service account link")
    }

    /// Every link for a (service, external id) pair, matched by folded
    /// equality. More than one row is an integrity problem the resolver
    /// surfaces.
    pub async fn find_links(
        &self,
        service: &str,
        service_id: &str,
    ) -> Result<Vec<service_accounts::Model>> {
        ServiceAccounts::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(service_accounts::Column::Service)))
                    .eq(service.to_lowercase()),
            )
            .filter(
                Expr::expr(Func::lower(Expr::col(service_accounts::Column::ServiceId)))
                    .eq(service_id.to_lowercase()),
            )
            .all(&self.conn)
            .await
            .context("Failed to query service account links")
    }
}
