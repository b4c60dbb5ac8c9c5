pub mod notification;
pub mod record;
pub mod requests;
pub mod responses;
pub mod session;
pub mod state;
