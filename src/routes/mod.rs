pub mod event;
pub mod health;
pub mod lifecycle;
pub mod session;
