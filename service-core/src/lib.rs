//! service-core: Shared infrastructure for the fees back-office services.
pub mod config;
pub mod error;
pub mod middleware;

pub use axum;
pub use validator;
