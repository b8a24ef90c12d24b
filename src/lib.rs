// ABOUTME: Library root for berth - engine discovery, backend adapters and dashboard orchestration.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod dashboard;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod model;
pub mod runtime;
pub mod types;
