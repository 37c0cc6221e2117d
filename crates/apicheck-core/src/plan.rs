//! Dry run plan: the requests a suite run would make
//!
//! Built from the config and route table alone, no request is sent.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A request a test method would issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlannedRequest {
    /// Test method name
    pub case: String,
    /// Path relative to the base URL
    pub path: String,
    pub resource: String,
    pub expected_status: u16,
}

/// Complete dry run plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DryRunPlan {
    /// Base URL requests would go to
    pub base_url: String,
    /// Backend selected from the OpenAPI document
    pub backend: String,
    pub requests: Vec<PlannedRequest>,
    /// Methods that would be skipped, with the reason
    pub skipped: Vec<(String, String)>,
}

impl DryRunPlan {
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Dry run: {} requests planned against {} ({} backend)\n",
            self.requests.len(),
            self.base_url,
            self.backend,
        ));

        let mut current: Option<&str> = None;
        for req in &self.requests {
            if current != Some(req.case.as_str()) {
                lines.push(format!("{}:", req.case));
                current = Some(req.case.as_str());
            }
            lines.push(format!(
                "  GET {} -> {} {}",
                req.path, req.expected_status, req.resource
            ));
        }

        for (name, reason) in &self.skipped {
            lines.push(format!("{name}: skipped ({reason})"));
        }

        lines.join("\n")
    }
}
