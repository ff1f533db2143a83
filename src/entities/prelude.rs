pub use super::actors::Entity as Actors;
pub use super::blocked_commands::Entity as BlockedCommands;
pub use super::events::Entity as Events;
pub use super::service_accounts::Entity as ServiceAccounts;
pub use super::users::Entity as Users;
pub use super::virtual_machines::Entity as VirtualMachines;
