//! STOCKSCAN — Exchange instrument scanner with Monte Carlo forecasting
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod pool;
pub mod fetch;
pub mod forecast;
pub mod engine;
pub mod sync;
pub mod narrative;
pub mod watchlist;
