use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{service_accounts, users, virtual_machines};

pub mod migrator;
pub mod repositories;

pub use repositories::audit::AuditEntry;

/// Owns the connection pool and fronts the per-table repositories. Every
/// call is a short-lived statement; no transaction ever spans an external
/// provisioner invocation.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn connect(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn vm_repo(&self) -> repositories::vm::VmRepository {
        repositories::vm::VmRepository::new(self.conn.clone())
    }

    fn service_account_repo(&self) -> repositories::service_account::ServiceAccountRepository {
        repositories::service_account::ServiceAccountRepository::new(self.conn.clone())
    }

    fn blocklist_repo(&self) -> repositories::blocklist::BlocklistRepository {
        repositories::blocklist::BlocklistRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    // --- users ---

    pub async fn create_user(&self, name: &str) -> Result<users::Model> {
        self.user_repo().create(name).await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<users::Model>> {
        self.user_repo().get(id).await
    }

    pub async fn find_users_by_name(&self, name: &str) -> Result<Vec<users::Model>> {
        self.user_repo().find_by_name(name).await
    }

    pub async fn find_users_by_name_fragment(&self, fragment: &str) -> Result<Vec<users::Model>> {
        self.user_repo().find_by_name_fragment(fragment).await
    }

    pub async fn list_active_users(&self) -> Result<Vec<users::Model>> {
        self.user_repo().list_active().await
    }

    pub async fn set_user_admin(&self, id: i64, is_admin: bool) -> Result<u64> {
        self.user_repo().set_admin(id, is_admin).await
    }

    pub async fn set_user_works_here(&self, id: i64, works_here: bool) -> Result<u64> {
        self.user_repo().set_works_here(id, works_here).await
    }

    // --- virtual machines ---

    pub async fn insert_vm_placeholder(
        &self,
        owner_id: i64,
        box_name: &str,
        temp_hostname: &str,
        now: &str,
    ) -> Result<virtual_machines::Model> {
        self.vm_repo()
            .insert_placeholder(owner_id, box_name, temp_hostname, now)
            .await
    }

    pub async fn finalize_vm(&self, id: i64, hostname: &str, ip: &str) -> Result<u64> {
        self.vm_repo().finalize(id, hostname, ip).await
    }

    pub async fn get_vm(&self, id: i64) -> Result<Option<virtual_machines::Model>> {
        self.vm_repo().get(id).await
    }

    pub async fn find_vms_by_hostname(
        &self,
        hostname: &str,
    ) -> Result<Vec<virtual_machines::Model>> {
        self.vm_repo().find_by_hostname(hostname).await
    }

    pub async fn count_vms_owned(&self, owner_id: i64) -> Result<u64> {
        self.vm_repo().count_owned(owner_id).await
    }

    pub async fn set_vm_active(&self, id: i64, active: bool) -> Result<u64> {
        self.vm_repo().set_active(id, active).await
    }

    pub async fn set_vm_owner(&self, id: i64, owner_id: i64) -> Result<u64> {
        self.vm_repo().set_owner(id, owner_id).await
    }

    pub async fn touch_vm_build_date(&self, id: i64, now: &str) -> Result<u64> {
        self.vm_repo().touch_build_date(id, now).await
    }

    pub async fn delete_vm(&self, id: i64) -> Result<u64> {
        self.vm_repo().delete(id).await
    }

    pub async fn list_active_vms(
        &self,
    ) -> Result<Vec<(virtual_machines::Model, Option<users::Model>)>> {
        self.vm_repo().list_active().await
    }

    pub async fn list_all_vms(
        &self,
    ) -> Result<Vec<(virtual_machines::Model, Option<users::Model>)>> {
        self.vm_repo().list_all().await
    }

    pub async fn list_reclaimable_vms(&self) -> Result<Vec<virtual_machines::Model>> {
        self.vm_repo().list_reclaimable().await
    }

    // --- service accounts ---

    pub async fn link_service_account(
        &self,
        user_id: i64,
        username: &str,
        service_id: &str,
        service: &str,
    ) -> Result<service_accounts::Model> {
        self.service_account_repo()
            .link(user_id, username, service_id, service)
            .await
    }

    pub async fn find_service_links(
        &self,
        service: &str,
        service_id: &str,
    ) -> Result<Vec<service_accounts::Model>> {
        self.service_account_repo()
            .find_links(service, service_id)
            .await
    }

    // --- blocklist ---

    pub async fn blocked_commands(&self) -> Result<Vec<String>> {
        self.blocklist_repo().all().await
    }

    pub async fn add_blocked_command(&self, command: &str) -> Result<()> {
        self.blocklist_repo().add(command).await
    }

    // --- audit ---

    pub async fn append_event(
        &self,
        description: &str,
        timestamp: i64,
        actor_ids: &[i64],
    ) -> Result<i64> {
        self.audit_repo()
            .append(description, timestamp, actor_ids)
            .await
    }

    pub async fn events_since(&self, timestamp: i64) -> Result<Vec<AuditEntry>> {
        self.audit_repo().since(timestamp).await
    }
}
