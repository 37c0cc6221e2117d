//! JSON Schema for the suite report, for consumers of `--output json`

use crate::report::SuiteReport;

/// Generate JSON Schema for [`SuiteReport`].
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(SuiteReport);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}
