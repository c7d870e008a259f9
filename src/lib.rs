//! BaaS API - authentication and Stripe payments backend
//!
//! Email/password and OAuth sign-in with OTP verification and JWT
//! sessions, plus payment intents, refunds, customers, Connect accounts,
//! payouts and webhook verification on top of Stripe.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core business entities and logic
//! - **services**: Application use cases and business logic
//! - **infra**: Postgres, Redis, job queue, Stripe and OAuth adapters
//! - **api**: HTTP handlers, middleware, and routes
//! - **jobs**: Background job payloads and handlers
//! - **types**: Shared response types
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! baas-api serve
//!
//! # Run migrations
//! baas-api migrate up
//!
//! # Deliver queued OTP emails
//! baas-api jobs work
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Password, User};
pub use errors::{AppError, AppResult};
pub use infra::Cache;
