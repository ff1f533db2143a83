use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, Func},
};

use crate::entities::{prelude::*, users};

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a new user and return the row, id included. The id comes back
    /// from the insert itself; it is never re-queried by value.
    pub async fn create(&self, name: &str) -> Result<users::Model> {
        let active = users::ActiveModel {
            name: Set(name.to_string()),
            works_here: Set(true),
            is_admin: Set(false),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")
    }

    pub async fn get(&self, id: i64) -> Result<Option<users::Model>> {
        Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by id")
    }

    /// Exact match, case-insensitive. Folded equality, not a pattern, so
    /// `%` and `_` in the input have no special meaning. Names are not
    /// unique, so this may return several rows.
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<users::Model>> {
        Users::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(users::Column::Name))).eq(name.to_lowercase()),
            )
            .all(&self.conn)
            .await
            .context("Failed to query users by name")
    }

    /// Substring match. An empty result means the caller needs a better hint.
    pub async fn find_by_name_fragment(&self, fragment: &str) -> Result<Vec<users::Model>> {
        Users::find()
            .filter(users::Column::Name.contains(fragment))
            .all(&self.conn)
            .await
            .context("Failed to query users by name fragment")
    }

    /// Active employees, ordered by name.
    pub async fn list_active(&self) -> Result<Vec<users::Model>> {
        Users::find()
            .filter(users::Column::WorksHere.eq(true))
            .order_by_asc(users::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list active users")
    }

    /// Returns the number of rows touched; 0 means no such user.
    pub async fn set_admin(&self, id: i64, is_admin: bool) -> Result<u64> {
        let result = Users::update_many()
            .col_expr(users::Column::IsAdmin, Expr::value(is_admin))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update admin flag")?;

        Ok(result.rows_affected)
    }

    pub async fn set_works_here(&self, id: i64, works_here: bool) -> Result<u64> {
        let result = Users::update_many()
            .col_expr(users::Column::WorksHere, Expr::value(works_here))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update works_here flag")?;

        Ok(result.rows_affected)
    }
}
