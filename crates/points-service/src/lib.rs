//! Points ledger HTTP API service.
//!
//! This crate exposes the ledger over HTTP:
//!
//! - User registration with referral codes
//! - Points transfers
//! - Balance and transfer history reads
//!
//! The router is generic over the store, so tests run it against
//! `points_store::MemoryStore` and the binary against PostgreSQL.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{DatabaseConfig, ServiceConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
