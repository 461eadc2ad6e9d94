//! Student standing registry core.
//!
//! The registry tracks students' academic and financial standing, restricts
//! access per caller role, classifies records against configurable risk
//! thresholds, reconciles tabular imports idempotently, and propagates
//! change events to connected replicas.

pub mod config;
pub mod error;
pub mod registry;
pub mod sync;
pub mod telemetry;
