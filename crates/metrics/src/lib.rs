//! Metrics collection and export for calbridge.
//!
//! This crate provides a unified metrics interface using the `metrics` crate facade.
//! When the `prometheus` feature is enabled, metrics are exported in Prometheus format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use calbridge_metrics::{counter, oauth, labels};
//!
//! counter!(oauth::FLOWS_STARTED_TOTAL, labels::PROVIDER => "google").increment(1);
//! ```
//!
//! # Features
//!
//! - `prometheus`: Enable Prometheus metrics export via `/metrics` endpoint

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
