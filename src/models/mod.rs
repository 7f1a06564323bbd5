pub mod attendance;
pub mod event;
pub mod ticket;
pub mod transaction;
