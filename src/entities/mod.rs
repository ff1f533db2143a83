pub mod prelude;

pub mod actors;
pub mod blocked_commands;
pub mod events;
pub mod service_accounts;
pub mod users;
pub mod virtual_machines;
