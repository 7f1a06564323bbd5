pub mod attendance;
pub mod events;
pub mod inventory;
pub mod payments;
pub mod tickets;
