//! Turnover scheduling and conflict detection for short-term rental apartments.

pub mod config;
pub mod error;
pub mod scheduling;
pub mod telemetry;
