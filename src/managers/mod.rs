pub mod coordinator;
pub mod countdown;
pub mod lifecycle;
pub mod store;
