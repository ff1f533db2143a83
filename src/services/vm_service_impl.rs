//! Vagrant-backed implementation of the `VmService` trait.
//!
//! Each operation pairs a store mutation with an external provisioner
//! invocation. Store statements are short-lived; the provisioner can run for
//! tens of seconds and must never hold a database lock. Working directories
//! are passed explicitly per invocation, so concurrent operations never race
//! on process-wide state.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

use crate::audit::AuditLog;
use crate::clients::vagrant::VagrantClient;
use crate::config::ProvisionerConfig;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::render::{VagrantfileRenderer, VmFacts};
use crate::security::CommandFilter;
use crate::services::vm_service::{BuildOutcome, CleanReport, VmListing, VmRef, VmService};

pub struct VagrantVmService {
    store: Store,
    vagrant: VagrantClient,
    renderer: VagrantfileRenderer,
    audit: Arc<AuditLog>,
    filter: Arc<CommandFilter>,
    settings: ProvisionerConfig,
}

impl VagrantVmService {
    #[must_use]
    pub const fn new(
        store: Store,
        vagrant: VagrantClient,
        renderer: VagrantfileRenderer,
        audit: Arc<AuditLog>,
        filter: Arc<CommandFilter>,
        settings: ProvisionerConfig,
    ) -> Self {
        Self {
            store,
            vagrant,
            renderer,
            audit,
            filter,
            settings,
        }
    }

    fn vm_dir(&self, id: i64) -> PathBuf {
        self.settings.work_dir.join(id.to_string())
    }

    /// The VM's working directory, or `NotFound` when provisioning never got
    /// that far (or the directory was removed out of band).
    fn existing_vm_dir(&self, id: i64) -> Result<PathBuf> {
        let dir = self.vm_dir(id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::not_found("working directory for VM", id))
        }
    }

    /// Blocklist gate in front of every external invocation.
    async fn guard(&self, invocation: &str) -> Result<()> {
        if self.filter.allow(invocation).await {
            Ok(())
        } else {
            Err(Error::Blocked(invocation.to_string()))
        }
    }

    async fn guard_subcommand(&self, subcommand: &str) -> Result<()> {
        self.guard(&format!("{} {subcommand}", self.vagrant.binary()))
            .await
    }

    fn derive_facts(&self, id: i64) -> VmFacts {
        VmFacts {
            id,
            hostname: format!("{}{id}", self.settings.hostname_prefix),
            ip: derive_ip(&self.settings.ip_prefix, id),
        }
    }

    /// Teardown for a VM we already resolved. Shared by destroy, rebuild,
    /// delete and clean.
    async fn destroy_by_id(&self, id: i64) -> Result<String> {
        let touched = self.store.set_vm_active(id, false).await?;
        if touched == 0 {
            return Err(Error::not_found("VM", id));
        }

        let dir = self.existing_vm_dir(id)?;
        self.guard_subcommand("destroy --force").await?;
        let output = self.vagrant.destroy(&dir).await;
        if !output.success {
            warn!(vm = id, "provisioner teardown reported failure");
        }

        Ok(output.text)
    }
}

/// Deterministic ip derivation: the configured prefix plus a host octet kept
/// clear of the low DHCP range.
fn derive_ip(prefix: &str, id: i64) -> String {
    format!("{prefix}{}", 30 + (id % 200))
}

fn listing(vm: crate::entities::virtual_machines::Model, owner: Option<String>) -> VmListing {
    VmListing {
        id: vm.id,
        hostname: vm.hostname,
        ip: vm.ip,
        owner: owner.unwrap_or_default(),
        active: vm.active.unwrap_or(true),
    }
}

#[async_trait]
impl VmService for VagrantVmService {
    async fn resolve(&self, target: &VmRef) -> Result<i64> {
        match target {
            VmRef::Id(id) => {
                let vm = self.store.get_vm(*id).await?;
                vm.map(|vm| vm.id)
                    .ok_or_else(|| Error::not_found("VM", id))
            }
            VmRef::Hostname(hostname) => {
                let matches = self.store.find_vms_by_hostname(hostname).await?;
                match matches.as_slice() {
                    [] => Err(Error::not_found("VM", hostname)),
                    [vm] => Ok(vm.id),
                    _ => Err(Error::Ambiguous(hostname.clone())),
                }
            }
        }
    }

    async fn build(&self, owner: i64, box_name: Option<&str>) -> Result<BuildOutcome> {
        self.audit
            .record_call("build_vm", &format!("owner={owner} box={box_name:?}"))
            .await;

        let cap = self.settings.max_vms_per_user;
        let current = self.store.count_vms_owned(owner).await?;
        if current >= cap {
            return Ok(BuildOutcome::Refused { current, cap });
        }

        if self.store.get_user(owner).await?.is_none() {
            return Err(Error::not_found("user", owner));
        }

        let now = Utc::now();
        let box_name = box_name.unwrap_or(&self.settings.default_box);
        // The synthetic hostname claims the row while provisioning runs; the
        // id itself comes back from the insert, so a concurrent build can
        // never pick up this row by value equality.
        let placeholder = format!("under-construction-{}", now.timestamp());
        let vm = self
            .store
            .insert_vm_placeholder(owner, box_name, &placeholder, &now.to_rfc3339())
            .await?;

        let dir = self.vm_dir(vm.id);
        tokio::fs::create_dir_all(&dir).await?;

        let facts = self.derive_facts(vm.id);
        self.renderer.render(&facts, &dir)?;

        self.guard_subcommand("up").await?;
        let output = self.vagrant.up(&dir).await;

        if output.success {
            self.store
                .finalize_vm(vm.id, &facts.hostname, &facts.ip)
                .await?;
            Ok(BuildOutcome::Built {
                id: vm.id,
                hostname: facts.hostname,
                ip: facts.ip,
                output: output.text,
            })
        } else {
            // The placeholder row stays behind on purpose: a surviving
            // under-construction hostname is how operators spot a build that
            // died here.
            warn!(vm = vm.id, "provisioner up failed; placeholder row kept");
            Ok(BuildOutcome::ProvisionerFailed {
                id: vm.id,
                output: output.text,
            })
        }
    }

    async fn destroy(&self, target: &VmRef) -> Result<String> {
        self.audit
            .record_call("destroy_vm", &format!("target={target}"))
            .await;

        let id = self.resolve(target).await?;
        self.destroy_by_id(id).await
    }

    async fn rebuild(&self, target: &VmRef) -> Result<String> {
        self.audit
            .record_call("rebuild_vm", &format!("target={target}"))
            .await;

        let id = self.resolve(target).await?;
        let dir = self.existing_vm_dir(id)?;

        // Intended end state, set up front. If the external steps fail the
        // row still reads active; the caller learns the truth from the
        // output text.
        self.store.set_vm_active(id, true).await?;

        self.guard_subcommand("destroy --force").await?;
        let teardown = self.vagrant.destroy(&dir).await;

        self.guard_subcommand("up").await?;
        let reup = self.vagrant.up(&dir).await;
        if reup.success {
            self.store
                .touch_vm_build_date(id, &Utc::now().to_rfc3339())
                .await?;
        }

        Ok(format!("{}\n{}", teardown.text, reup.text))
    }

    async fn provision(&self, target: &VmRef) -> Result<String> {
        self.audit
            .record_call("provision_vm", &format!("target={target}"))
            .await;

        let id = self.resolve(target).await?;
        let dir = self.existing_vm_dir(id)?;

        self.guard_subcommand("provision").await?;
        let output = self.vagrant.provision(&dir).await;

        Ok(output.text)
    }

    async fn delete(&self, target: &VmRef) -> Result<String> {
        self.audit
            .record_call("delete_vm", &format!("target={target}"))
            .await;

        let id = self.resolve(target).await?;

        // A missing working directory must not make the record undeletable;
        // that is exactly the crashed-mid-build case delete cleans up.
        let output = match self.destroy_by_id(id).await {
            Ok(text) => text,
            Err(Error::NotFound(_)) => String::new(),
            Err(err) => return Err(err),
        };

        self.store.delete_vm(id).await?;
        Ok(output)
    }

    async fn clean(&self) -> Result<CleanReport> {
        self.audit.record_call("clean_vms", "").await;

        let mut report = CleanReport::default();

        for vm in self.store.list_reclaimable_vms().await? {
            report.hostnames.push(vm.hostname.clone());
            match self.destroy_by_id(vm.id).await {
                Ok(text) => report.output.push_str(&text),
                Err(err) => {
                    warn!(vm = vm.id, hostname = %vm.hostname, "clean teardown failed: {err}");
                    report.output.push_str(&err.to_string());
                    report.output.push('\n');
                }
            }
        }

        self.guard_subcommand("global-status --prune").await?;
        let prune = self.vagrant.prune(&self.settings.work_dir).await;
        report.output.push_str(&prune.text);

        Ok(report)
    }

    async fn claim(&self, target: &VmRef, new_owner: i64) -> Result<()> {
        self.audit
            .record_call("claim_vm", &format!("target={target} owner={new_owner}"))
            .await;

        let id = self.resolve(target).await?;
        if self.store.get_user(new_owner).await?.is_none() {
            return Err(Error::not_found("user", new_owner));
        }

        self.store.set_vm_owner(id, new_owner).await?;
        Ok(())
    }

    async fn vm_count(&self, owner: i64) -> Result<u64> {
        let count = self.store.count_vms_owned(owner).await?;
        Ok(count)
    }

    async fn list_vms(&self) -> Result<Vec<VmListing>> {
        let rows = self.store.list_active_vms().await?;
        Ok(rows
            .into_iter()
            .map(|(vm, owner)| listing(vm, owner.map(|user| user.name)))
            .collect())
    }

    async fn list_all_vms(&self) -> Result<Vec<VmListing>> {
        let rows = self.store.list_all_vms().await?;
        Ok(rows
            .into_iter()
            .map(|(vm, owner)| listing(vm, owner.map(|user| user.name)))
            .collect())
    }

    async fn passthrough(&self, raw: &str) -> Result<String> {
        self.audit.record_call("passthrough", raw).await;

        self.guard(raw).await?;

        let output = self
            .vagrant
            .passthrough(&self.settings.work_dir, raw)
            .await
            .map_err(|err| Error::ExternalProcess(format!("`{raw}`: {err}")))?;
        if !output.success {
            error!(command = raw, "passthrough command failed");
        }

        Ok(output.text)
    }
}
