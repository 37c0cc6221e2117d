//! apicheck-core: configuration and report types for OpenAPI contract checks
//!
//! This crate holds what the runner and the CLI share: the harness
//! configuration, the per-method results and the verdict derived from them.

pub mod config;
pub mod plan;
pub mod report;
pub mod schema;

pub use config::{BasicAuth, Config, ConfigError, EndpointCase, FixtureId, SessionConfig};
pub use plan::{DryRunPlan, PlannedRequest};
pub use report::{
    CaseResult, CaseStatus, CheckRecord, SuiteReport, Totals, Verdict, VerdictStatus,
};
