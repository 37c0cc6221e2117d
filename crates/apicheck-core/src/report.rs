//! Suite results and the pass/fail verdict derived from them
//!
//! A run produces one [`CaseResult`] per test method. Failures (wrong status,
//! schema mismatch) and errors (transport problems) are kept apart, the way a
//! test runner reports them, but both fail the verdict.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of one test method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Every assertion held
    Passed,
    /// An assertion failed (status code or schema)
    Failed,
    /// The method could not complete (network, unknown schema, ...)
    Errored,
    /// The fixture driving the method is not configured
    Skipped,
}

impl CaseStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "ok",
            Self::Failed => "FAIL",
            Self::Errored => "ERROR",
            Self::Skipped => "skipped",
        }
    }

    /// Whether this outcome keeps the verdict green.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Passed | Self::Skipped)
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request issued by a test method and what was asserted about it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckRecord {
    /// Path relative to the base URL, e.g. "/students/12345/account-balance"
    pub path: String,
    /// Schema name the body was validated against
    pub resource: String,
    pub expected_status: u16,
    /// `None` when no response arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    /// Assertion failures; empty when the check passed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl CheckRecord {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of one test method.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaseResult {
    /// Method name, e.g. "test_get_students_by_id"
    pub name: String,
    pub status: CaseStatus,
    /// Failure, error or skip reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Requests made, in order
    #[serde(default)]
    pub checks: Vec<CheckRecord>,
}

impl CaseResult {
    #[must_use]
    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CaseStatus::Skipped,
            message: Some(reason.into()),
            checks: Vec::new(),
        }
    }
}

/// Per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Totals {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub errored: u64,
    pub skipped: u64,
    /// HTTP requests issued across all methods
    pub requests: u64,
}

/// Full result of a suite run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SuiteReport {
    /// Results in execution order
    pub cases: Vec<CaseResult>,
    /// Wall-clock duration of the run
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Final verdict for the run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// 0 = pass, 1 = failures or errors, 3 = nothing ran
    pub exit_code: i32,
    pub reason: String,
}

impl SuiteReport {
    #[must_use]
    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for case in &self.cases {
            totals.total += 1;
            totals.requests += case.checks.len() as u64;
            match case.status {
                CaseStatus::Passed => totals.passed += 1,
                CaseStatus::Failed => totals.failed += 1,
                CaseStatus::Errored => totals.errored += 1,
                CaseStatus::Skipped => totals.skipped += 1,
            }
        }
        totals
    }

    /// Methods that failed or errored.
    pub fn unsuccessful(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.status.is_success())
    }

    /// PASS iff at least one method was selected and none failed or errored.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        let totals = self.totals();

        if totals.total == 0 {
            return Verdict {
                status: VerdictStatus::Fail,
                exit_code: 3,
                reason: "No test methods selected".to_string(),
            };
        }

        if totals.failed == 0 && totals.errored == 0 {
            let reason = if totals.skipped > 0 {
                format!("{} passed, {} skipped", totals.passed, totals.skipped)
            } else {
                format!("All {} test methods passed", totals.passed)
            };
            return Verdict {
                status: VerdictStatus::Pass,
                exit_code: 0,
                reason,
            };
        }

        let mut parts = Vec::new();
        if totals.failed > 0 {
            parts.push(format!("{} failed", totals.failed));
        }
        if totals.errored > 0 {
            parts.push(format!("{} errored", totals.errored));
        }
        Verdict {
            status: VerdictStatus::Fail,
            exit_code: 1,
            reason: format!("{} of {} test methods", parts.join(", "), totals.total),
        }
    }

    /// Runner-style summary for terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        for case in &self.cases {
            match (&case.status, &case.message) {
                (CaseStatus::Skipped, Some(reason)) => {
                    lines.push(format!("{} ... skipped ({reason})", case.name));
                }
                (status, _) => lines.push(format!("{} ... {status}", case.name)),
            }
            if !case.status.is_success() {
                if let Some(msg) = &case.message {
                    lines.push(format!("  {msg}"));
                }
            }
        }

        let totals = self.totals();
        lines.push(String::new());
        lines.push(format!(
            "Ran {} test methods ({} requests) in {:.3}s",
            totals.total, totals.requests, self.duration_secs
        ));

        let mut details = Vec::new();
        if totals.failed > 0 {
            details.push(format!("failures={}", totals.failed));
        }
        if totals.errored > 0 {
            details.push(format!("errors={}", totals.errored));
        }
        if totals.skipped > 0 {
            details.push(format!("skipped={}", totals.skipped));
        }
        let verdict = self.verdict();
        if details.is_empty() {
            lines.push(format!("{}", verdict.status));
        } else {
            lines.push(format!("{} ({})", verdict.status, details.join(", ")));
        }

        lines.join("\n")
    }
}
