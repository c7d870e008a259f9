//! HTTP request handlers.

pub mod auth_handler;
pub mod stripe_handler;

pub use auth_handler::{account_routes, auth_routes, refresh_routes};
pub use stripe_handler::stripe_routes;
