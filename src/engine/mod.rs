//! Scan engine.
//!
//! The orchestrator drives the pool through fetcher and forecast engine
//! under the rate budget, accumulates results, and ranks them.

pub mod orchestrator;

pub use orchestrator::{ScanOrchestrator, ScanParams};
