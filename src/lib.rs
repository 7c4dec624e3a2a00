//! # Back-office API Library
//!
//! Multi-tenant financial back office: banks, payables and receivables,
//! recurring rules, products and kits, and the Mercado Livre integration
//! with its sales analytics.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod marketplace;
pub mod models;
pub mod money;
pub mod repositories;
pub mod server;
pub mod storage;
pub mod telemetry;
pub use migration;
