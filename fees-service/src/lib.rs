//! fees-service: billing and dues engine for the coaching-center back office.
//!
//! Owns invoices, receipts, dues and the bill number sequence, and serves
//! the collections dashboard. Storage is SQLite via sqlx; every financial
//! mutation is transactional.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::Application;
