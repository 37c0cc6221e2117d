//! Test methods: one per endpoint, driven by configured fixtures
//!
//! Each method requests every valid fixture ID (expects 200 + the resource
//! schema) and then the not-found identifier once (expects 404 + `Error`).

use apicheck_core::{CaseResult, CaseStatus, CheckRecord, Config, EndpointCase, PlannedRequest};
use tracing::{debug, warn};

use crate::endpoint::{EndpointError, test_endpoint};
use crate::suite::SuiteContext;

/// (method name, path suffix, fixture, resource, not-found probe suffix)
const STUDENT_ROUTES: [(&str, &str, &str, &str, &str); 10] = [
    (
        "test_get_students_by_id",
        "account-balance",
        "valid_account_balance",
        "AccountBalanceResource",
        "",
    ),
    (
        "test_get_account_transactions",
        "account-transactions",
        "valid_account_transactions",
        "AccountTransactionsResult",
        "account-transactions",
    ),
    (
        "test_get_academic_status",
        "academic-status",
        "valid_academic_status",
        "AcademicStatusResult",
        "academic-status",
    ),
    (
        "test_get_classification",
        "classification",
        "valid_classification",
        "ClassificationResult",
        "classification",
    ),
    (
        "test_get_gpa",
        "gpa",
        "valid_gpa",
        "GradePointAverageResult",
        "gpa",
    ),
    (
        "test_get_grades",
        "grades",
        "valid_grades",
        "GradesResult",
        "grades",
    ),
    (
        "test_get_class_schedule",
        "class-schedule",
        "valid_class_schedule",
        "ClassScheduleResult",
        "class-schedule",
    ),
    (
        "test_get_holds",
        "holds",
        "valid_holds",
        "HoldsResult",
        "holds",
    ),
    (
        "test_get_work_study",
        "work-study",
        "valid_work_study",
        "WorkStudyResult",
        "work-study",
    ),
    (
        "test_get_dual_enrollment",
        "dual-enrollment",
        "valid_dual_enrollment",
        "DualEnrollmentResult",
        "dual-enrollment",
    ),
];

/// The student API routes tested when the config defines no `endpoints`.
#[must_use]
pub fn builtin_cases() -> Vec<EndpointCase> {
    STUDENT_ROUTES
        .iter()
        .map(|&(name, suffix, fixture, resource, not_found)| EndpointCase {
            name: name.to_string(),
            path: format!("/students/{{id}}/{suffix}"),
            fixture: fixture.to_string(),
            resource: resource.to_string(),
            not_found_path: Some(if not_found.is_empty() {
                "/students/{id}".to_string()
            } else {
                format!("/students/{{id}}/{not_found}")
            }),
            error_resource: "Error".to_string(),
        })
        .collect()
}

/// Requests a method makes, in order, or the reason it is skipped.
///
/// # Errors
///
/// Returns the skip reason when the method's fixture is not configured.
pub fn requests_for(config: &Config, case: &EndpointCase) -> Result<Vec<PlannedRequest>, String> {
    let ids = config
        .fixture(&case.fixture)
        .ok_or_else(|| format!("fixture '{}' not configured", case.fixture))?;

    let mut requests: Vec<PlannedRequest> = ids
        .iter()
        .map(|id| PlannedRequest {
            case: case.name.clone(),
            path: case.path_for(id.as_str()),
            resource: case.resource.clone(),
            expected_status: 200,
        })
        .collect();

    // The sentinel is one identifier, never iterated per character
    if let Some(path) = case.not_found_path_for(&config.not_found_id) {
        requests.push(PlannedRequest {
            case: case.name.clone(),
            path,
            resource: case.error_resource.clone(),
            expected_status: 404,
        });
    }

    Ok(requests)
}

/// Run one test method against the shared context.
///
/// Stops at the first failing assertion, like a test method would.
pub fn run_case(ctx: &SuiteContext, case: &EndpointCase) -> CaseResult {
    let requests = match requests_for(&ctx.config, case) {
        Ok(r) => r,
        Err(reason) => {
            debug!(case = %case.name, %reason, "skipped");
            return CaseResult::skipped(&case.name, reason);
        }
    };

    let mut checks = Vec::with_capacity(requests.len());
    for req in &requests {
        match test_endpoint(
            &ctx.session,
            &ctx.spec,
            &req.path,
            &req.resource,
            req.expected_status,
        ) {
            Ok(record) => {
                let failure = record.failures.first().cloned();
                checks.push(record);
                if let Some(message) = failure {
                    warn!(case = %case.name, path = %req.path, "{message}");
                    return CaseResult {
                        name: case.name.clone(),
                        status: CaseStatus::Failed,
                        message: Some(message),
                        checks,
                    };
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(case = %case.name, path = %req.path, error = %message, "errored");
                checks.push(CheckRecord {
                    path: req.path.clone(),
                    resource: req.resource.clone(),
                    expected_status: req.expected_status,
                    actual_status: None,
                    elapsed_secs: None,
                    failures: vec![message.clone()],
                });
                let message = match e {
                    EndpointError::Session(_) => message,
                    EndpointError::Spec(_) => format!("{message} (check the resource name)"),
                };
                return CaseResult {
                    name: case.name.clone(),
                    status: CaseStatus::Errored,
                    message: Some(message),
                    checks,
                };
            }
        }
    }

    CaseResult {
        name: case.name.clone(),
        status: CaseStatus::Passed,
        message: None,
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: serde_json::Value) -> Config {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn builtin_table_covers_student_routes() {
        let cases = builtin_cases();
        assert_eq!(cases.len(), 10);

        let by_id = cases
            .iter()
            .find(|c| c.name == "test_get_students_by_id")
            .unwrap();
        assert_eq!(by_id.path_for("12345"), "/students/12345/account-balance");
        assert_eq!(by_id.resource, "AccountBalanceResource");
        assert_eq!(
            by_id.not_found_path_for("999999999").as_deref(),
            Some("/students/999999999")
        );

        let holds = cases.iter().find(|c| c.name == "test_get_holds").unwrap();
        assert_eq!(
            holds.not_found_path_for("999999999").as_deref(),
            Some("/students/999999999/holds")
        );
    }

    #[test]
    fn requests_cover_each_valid_id_then_one_not_found() {
        let config = config(serde_json::json!({
            "base_url": "http://localhost",
            "test_cases": {"valid_account_balance": ["12345", 67890]}
        }));
        let case = &builtin_cases()[0];
        let requests = requests_for(&config, case).unwrap();

        let summary: Vec<(&str, u16, &str)> = requests
            .iter()
            .map(|r| (r.path.as_str(), r.expected_status, r.resource.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/students/12345/account-balance", 200, "AccountBalanceResource"),
                ("/students/67890/account-balance", 200, "AccountBalanceResource"),
                ("/students/999999999", 404, "Error"),
            ]
        );
    }

    #[test]
    fn custom_not_found_id() {
        let config = config(serde_json::json!({
            "base_url": "http://localhost",
            "not_found_id": "000",
            "test_cases": {"valid_gpa": []}
        }));
        let gpa = builtin_cases()
            .into_iter()
            .find(|c| c.name == "test_get_gpa")
            .unwrap();
        let requests = requests_for(&config, &gpa).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/students/000/gpa");
    }

    #[test]
    fn missing_fixture_is_skip_reason() {
        let config = config(serde_json::json!({"base_url": "http://localhost"}));
        let reason = requests_for(&config, &builtin_cases()[0]).unwrap_err();
        assert_eq!(reason, "fixture 'valid_account_balance' not configured");
    }

    #[test]
    fn case_without_not_found_probe() {
        let config = config(serde_json::json!({
            "base_url": "http://localhost",
            "test_cases": {"valid_terms": ["201901"]}
        }));
        let case = EndpointCase {
            name: "test_get_terms".into(),
            path: "/terms/{id}".into(),
            fixture: "valid_terms".into(),
            resource: "TermResult".into(),
            not_found_path: None,
            error_resource: "Error".into(),
        };
        let requests = requests_for(&config, &case).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/terms/201901");
    }
}
