// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry, tracing, and metrics infrastructure.
//!
//! - **Tracing**: structured logging with spans for session lifecycle and
//!   routing decisions
//! - **Metrics**: counters for session starts/restarts/teardowns and
//!   per-prefix custom command statistics
//!
//! Initialize telemetry at application startup:
//!
//! ```rust,ignore
//! use elixir_ls_client::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{
    CommandMetrics, Histogram, Metrics, MetricsSnapshot, OperationMetrics, SessionEvent,
    GLOBAL_METRICS,
};
