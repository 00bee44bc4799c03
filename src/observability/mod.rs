//! Observability for the ingress path
//!
//! Structured logging through `tracing` and process-wide ingress counters.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{metrics, IngressMetrics, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{ingress_span, session_span};
