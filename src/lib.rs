pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod managers;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
