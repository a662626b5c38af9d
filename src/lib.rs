pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod supervisor;
pub mod uploads;

pub use routes::app;
pub use state::AppState;
