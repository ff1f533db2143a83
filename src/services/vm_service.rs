//! Domain service for the VM lifecycle state machine:
//! `Provisioning -> Active -> Destroyed`, with an `Active -> Active`
//! self-loop for rebuild/provision-in-place and a terminal `Deleted` reached
//! only from `Destroyed` via explicit delete.

use serde::Serialize;
use std::fmt;

use crate::error::Result;

/// VM-identifying input: either a numeric id or a hostname, decided once at
/// the API boundary instead of re-detected inside every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmRef {
    Id(i64),
    Hostname(String),
}

impl VmRef {
    /// Numeric input is an id, anything else is a hostname.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Hostname(trimmed.to_string()), Self::Id)
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Hostname(hostname) => f.write_str(hostname),
        }
    }
}

/// One row of the VM listing, with the owner's display name joined in.
#[derive(Debug, Clone, Serialize)]
pub struct VmListing {
    pub id: i64,
    pub hostname: String,
    pub ip: Option<String>,
    pub owner: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The owner is at or over the per-user cap. Nothing was mutated.
    Refused { current: u64, cap: u64 },

    /// Provisioning succeeded and the row was finalized.
    Built {
        id: i64,
        hostname: String,
        ip: String,
        output: String,
    },

    /// The external `up` failed; the placeholder row remains as evidence and
    /// the captured diagnostic text is surfaced to the caller.
    ProvisionerFailed { id: i64, output: String },
}

/// What `clean` touched. Records are deliberately NOT deleted; deletion is a
/// separate step operators perform after reviewing this report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub hostnames: Vec<String>,
    pub output: String,
}

#[async_trait::async_trait]
pub trait VmService: Send + Sync {
    /// Resolves a [`VmRef`] to a known VM id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if nothing matches and
    /// [`crate::Error::Ambiguous`] if a hostname matches several rows.
    async fn resolve(&self, target: &VmRef) -> Result<i64>;

    /// Builds a new VM for the owner: placeholder row (id claimed atomically
    /// from the insert), working directory, rendered config, external `up`,
    /// then row finalization.
    async fn build(&self, owner: i64, box_name: Option<&str>) -> Result<BuildOutcome>;

    /// Flips the row to inactive and tears the machine down. The external
    /// output is returned as text even when the teardown fails.
    async fn destroy(&self, target: &VmRef) -> Result<String>;

    /// Teardown plus re-up against the existing directory. Marks the row
    /// active up front (the intended end state); external failures are
    /// reported through the output text, not the row.
    async fn rebuild(&self, target: &VmRef) -> Result<String>;

    /// Re-runs the provisioner in place, no destroy/recreate.
    async fn provision(&self, target: &VmRef) -> Result<String>;

    /// Destroys the VM and removes its record entirely. Irreversible.
    async fn delete(&self, target: &VmRef) -> Result<String>;

    /// Destroys VMs owned by inactive users or already flagged inactive,
    /// then prunes the provisioner's global state cache.
    async fn clean(&self) -> Result<CleanReport>;

    /// Reassigns ownership without touching service account links.
    async fn claim(&self, target: &VmRef, new_owner: i64) -> Result<()>;

    async fn vm_count(&self, owner: i64) -> Result<u64>;

    /// Active view.
    async fn list_vms(&self) -> Result<Vec<VmListing>>;

    /// Raw view, destroyed rows included.
    async fn list_all_vms(&self) -> Result<Vec<VmListing>>;

    /// Executes a raw command line on the host, blocklist gated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Blocked`] when the security filter rejects
    /// the command (nothing is executed in that case) and
    /// [`crate::Error::ExternalProcess`] when the program cannot be spawned
    /// at all. A spawned program that exits non-zero is reported through the
    /// returned text instead.
    async fn passthrough(&self, raw: &str) -> Result<String>;
}
