use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
    sea_query::{Expr, Func},
};

use crate::entities::{prelude::*, users, virtual_machines};

pub struct VmRepository {
    conn: DatabaseConnection,
}

impl VmRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Claim a VM id by inserting the placeholder row. The allocated id is
    /// returned directly from the insert, so concurrent builds can never pick
    /// up each other's rows. A surviving `under-construction-*` hostname is
    /// evidence of a build that died before finalizing.
    pub async fn insert_placeholder(
        &self,
        owner_id: i64,
        box_name: &str,
        temp_hostname: &str,
        now: &str,
    ) -> Result<virtual_machines::Model> {
        let active = virtual_machines::ActiveModel {
            hostname: Set(temp_hostname.to_string()),
            owner_id: Set(owner_id),
            ip: Set(None),
            box_name: Set(box_name.to_string()),
            active: Set(None),
            init_date: Set(now.to_string()),
            last_build_date: Set(now.to_string()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert VM placeholder")
    }

    /// Fill in the real hostname and ip once provisioning succeeded.
    pub async fn finalize(&self, id: i64, hostname: &str, ip: &str) -> Result<u64> {
        let result = VirtualMachines::update_many()
            .col_expr(virtual_machines::Column::Hostname, Expr::value(hostname))
            .col_expr(virtual_machines::Column::Ip, Expr::value(ip))
            .col_expr(virtual_machines::Column::Active, Expr::value(true))
            .filter(virtual_machines::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to finalize VM row")?;

        Ok(result.rows_affected)
    }

    pub async fn get(&self, id: i64) -> Result<Option<virtual_machines::Model>> {
        VirtualMachines::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query VM by id")
    }

    /// Case-insensitive exact match, never a pattern. Hostnames are not
    /// guaranteed unique; callers handle ambiguity.
    pub async fn find_by_hostname(&self, hostname: &str) -> Result<Vec<virtual_machines::Model>> {
        VirtualMachines::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(virtual_machines::Column::Hostname)))
                    .eq(hostname.to_lowercase()),
            )
            .all(&self.conn)
            .await
            .context("Failed to query VM by hostname")
    }

    /// Counts every row owned by the user, destroyed ones included, matching
    /// the per-user cap semantics.
    pub async fn count_owned(&self, owner_id: i64) -> Result<u64> {
        VirtualMachines::find()
            .filter(virtual_machines::Column::OwnerId.eq(owner_id))
            .count(&self.conn)
            .await
            .context("Failed to count owned VMs")
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<u64> {
        let result = VirtualMachines::update_many()
            .col_expr(virtual_machines::Column::Active, Expr::value(active))
            .filter(virtual_machines::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update VM active flag")?;

        Ok(result.rows_affected)
    }

    pub async fn set_owner(&self, id: i64, owner_id: i64) -> Result<u64> {
        let result = VirtualMachines::update_many()
            .col_expr(virtual_machines::Column::OwnerId, Expr::value(owner_id))
            .filter(virtual_machines::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to reassign VM owner")?;

        Ok(result.rows_affected)
    }

    pub async fn touch_build_date(&self, id: i64, now: &str) -> Result<u64> {
        let result = VirtualMachines::update_many()
            .col_expr(virtual_machines::Column::LastBuildDate, Expr::value(now))
            .filter(virtual_machines::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update VM build date")?;

        Ok(result.rows_affected)
    }

    pub async fn delete(&self, id: i64) -> Result<u64> {
        let result = VirtualMachines::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete VM row")?;

        Ok(result.rows_affected)
    }

    /// Active view: rows whose flag is unset or true, with the owner joined.
    pub async fn list_active(
        &self,
    ) -> Result<Vec<(virtual_machines::Model, Option<users::Model>)>> {
        VirtualMachines::find()
            .find_also_related(Users)
            .filter(
                Condition::any()
                    .add(virtual_machines::Column::Active.is_null())
                    .add(virtual_machines::Column::Active.eq(true)),
            )
            .order_by_asc(virtual_machines::Column::Hostname)
            .all(&self.conn)
            .await
            .context("Failed to list active VMs")
    }

    /// Raw view: every recorded row, destroyed ones included.
    pub async fn list_all(&self) -> Result<Vec<(virtual_machines::Model, Option<users::Model>)>> {
        VirtualMachines::find()
            .find_also_related(Users)
            .order_by_asc(virtual_machines::Column::Hostname)
            .all(&self.conn)
            .await
            .context("Failed to list VMs")
    }

    /// VMs eligible for clean: owner no longer works here, or the VM itself
    /// was already destroyed.
    pub async fn list_reclaimable(&self) -> Result<Vec<virtual_machines::Model>> {
        let rows = VirtualMachines::find()
            .find_also_related(Users)
            .filter(
                Condition::any()
                    .add(users::Column::WorksHere.eq(false))
                    .add(virtual_machines::Column::Active.eq(false)),
            )
            .all(&self.conn)
            .await
            .context("Failed to list reclaimable VMs")?;

        Ok(rows.into_iter().map(|(vm, _)| vm).collect())
    }
}
