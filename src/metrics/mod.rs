//! Metrics installation (§2 "Metrics"): a thin wrapper around the
//! `metrics`/`metrics-exporter-prometheus` facade, installed once at binary
//! startup; call sites elsewhere in the crate call `metrics::counter!` etc.
//! directly rather than through wrapper functions, matching the teacher's
//! inline-macro style.

mod registry;

pub use registry::Metrics;
