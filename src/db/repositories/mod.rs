pub mod audit;
pub mod blocklist;
pub mod service_account;
pub mod user;
pub mod vm;
