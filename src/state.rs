use std::sync::Arc;

use crate::audit::AuditLog;
use crate::clients::vagrant::VagrantClient;
use crate::config::Config;
use crate::db::Store;
use crate::render::VagrantfileRenderer;
use crate::security::CommandFilter;
use crate::services::{
    IdentityService, SeaOrmIdentityService, VagrantVmService, VmService,
};

/// Wires the store, the blocklist filter, the audit log and the domain
/// services together. Cheap to clone; everything inside is shared.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub filter: Arc<CommandFilter>,

    pub audit: Arc<AuditLog>,

    pub identity: Arc<dyn IdentityService>,

    pub vms: Arc<dyn VmService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        // The durable blocklist becomes the in-memory set once, at startup;
        // add_blocked_command keeps the two in step afterwards.
        let blocked = store.blocked_commands().await?;
        let filter = Arc::new(CommandFilter::new(blocked));

        let audit = Arc::new(AuditLog::new(store.clone()));

        let vagrant = VagrantClient::new(
            config.provisioner.binary.clone(),
            config.provisioner.command_timeout_secs,
        );
        let renderer = VagrantfileRenderer::new(config.provisioner.templates_dir.clone());

        tokio::fs::create_dir_all(&config.provisioner.work_dir).await?;

        let identity = Arc::new(SeaOrmIdentityService::new(
            store.clone(),
            audit.clone(),
            config.general.service.clone(),
        )) as Arc<dyn IdentityService>;

        let vms = Arc::new(VagrantVmService::new(
            store.clone(),
            vagrant,
            renderer,
            audit.clone(),
            filter.clone(),
            config.provisioner.clone(),
        )) as Arc<dyn VmService>;

        Ok(Self {
            config: Arc::new(config),
            store,
            filter,
            audit,
            identity,
            vms,
        })
    }

    /// Blocks a command permanently. The durable record is written first;
    /// the in-memory set is only extended once that write succeeded, so the
    /// two can never silently diverge.
    pub async fn add_blocked_command(&self, command: &str) -> crate::error::Result<()> {
        self.audit.record_call("add_blocked_command", command).await;

        self.store.add_blocked_command(command).await?;
        self.filter.insert(command).await;

        Ok(())
    }
}
