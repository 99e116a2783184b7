//! HTTP API
//!
//! JSON over axum for the free-play game, the wallet and the staff
//! dashboard. Every response carries an `x-request-id` header.

pub mod errors;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use handlers::AppState;
pub use server::{create_app, init_tracing, ApiServer};
