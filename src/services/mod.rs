pub mod identity_service;
pub mod identity_service_impl;
pub mod vm_service;
pub mod vm_service_impl;

pub use identity_service::{IdentityService, NameMatch};
pub use identity_service_impl::SeaOrmIdentityService;
pub use vm_service::{BuildOutcome, CleanReport, VmListing, VmRef, VmService};
pub use vm_service_impl::VagrantVmService;
