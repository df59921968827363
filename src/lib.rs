//! League standings: derives per-season league tables from finished match
//! results and keeps them in sync as results arrive.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod engine;
pub mod storage;
pub mod import;
pub mod dashboard;
