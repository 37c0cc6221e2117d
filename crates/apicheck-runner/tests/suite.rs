//! End-to-end suite runs against a local mock server
//!
//! Each test writes an OpenAPI document and a config file to a temp dir,
//! points the config at a mockito server and runs the full lifecycle.

use std::path::PathBuf;

use apicheck_core::{CaseStatus, VerdictStatus};
use apicheck_runner::{Backend, Filter, ResolveError, Suite, SuiteError};

const SWAGGER: &str = r#"swagger: '2.0'
info:
  title: Students API
  version: v1
paths:
  /students/{osuId}/account-balance:
    get:
      parameters:
        - name: osuId
          in: path
          required: true
          type: string
      responses:
        '200':
          description: Account balance
          schema:
            $ref: '#/definitions/AccountBalanceResource'
        '404':
          description: Not found
          schema:
            $ref: '#/definitions/Error'
definitions:
  SelfLink:
    properties:
      self:
        type: string
        format: uri
  AccountBalanceResource:
    properties:
      links:
        $ref: '#/definitions/SelfLink'
      data:
        type: object
        required: [id, type, attributes]
        properties:
          id:
            type: string
          type:
            type: string
            enum: [account-balance]
          attributes:
            properties:
              currentBalance:
                type: number
                format: float
                x-nullable: true
  Error:
    required: [errors]
    properties:
      errors:
        type: array
        items:
          properties:
            status:
              type: string
            title:
              type: string
            detail:
              type: string
"#;

const OPENAPI3: &str = r#"openapi: 3.0.0
info:
  title: Students API
  version: v1
paths: {}
components:
  schemas:
    AccountBalanceResource:
      $ref: 'schemas/account-balance.yaml'
    Error:
      $ref: 'schemas/error.json#/Error'
"#;

const ACCOUNT_BALANCE_YAML: &str = r#"type: object
required: [data]
properties:
  data:
    type: object
    properties:
      id:
        type: string
      attributes:
        type: object
        properties:
          currentBalance:
            type: number
            nullable: true
"#;

const ERROR_JSON: &str =
    r#"{"Error": {"type": "object", "required": ["errors"], "properties": {"errors": {"type": "array"}}}}"#;

fn balance_body(id: &str) -> String {
    format!(
        r#"{{"links": {{"self": "https://api.example.edu/v1/students/{id}/account-balance"}},
            "data": {{"id": "{id}", "type": "account-balance", "attributes": {{"currentBalance": 99.99}}}}}}"#
    )
}

const NOT_FOUND_BODY: &str =
    r#"{"errors": [{"status": "404", "title": "Not Found", "detail": "No student found"}]}"#;

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn config(&self, value: serde_json::Value) -> PathBuf {
        self.write("config.json", &value.to_string())
    }
}

fn json_mock(
    server: &mut mockito::Server,
    path: &str,
    status: usize,
    body: &str,
) -> mockito::Mock {
    server
        .mock("GET", path)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(1)
        .create()
}

#[test]
fn valid_ids_and_not_found_sentinel_pass() {
    let mut server = mockito::Server::new();
    let m1 = json_mock(
        &mut server,
        "/students/12345/account-balance",
        200,
        &balance_body("12345"),
    );
    let m2 = json_mock(
        &mut server,
        "/students/67890/account-balance",
        200,
        &balance_body("67890"),
    );
    // Exactly one request for the sentinel, not one per character
    let m404 = json_mock(&mut server, "/students/999999999", 404, NOT_FOUND_BODY);

    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": server.url(),
        "session": {"bearer_token": "token"},
        "test_cases": {"valid_account_balance": ["12345", 67890]},
        "local_test": false
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    assert_eq!(suite.context().spec.backend(), Backend::Flex);

    let report = suite.run(&Filter::default());
    let requests = suite.cleanup();

    m1.assert();
    m2.assert();
    m404.assert();
    assert_eq!(requests, 3);

    let by_id = report
        .cases
        .iter()
        .find(|c| c.name == "test_get_students_by_id")
        .unwrap();
    assert_eq!(by_id.status, CaseStatus::Passed, "{:?}", by_id.message);
    assert_eq!(by_id.checks.len(), 3);
    assert_eq!(by_id.checks[2].path, "/students/999999999");
    assert_eq!(by_id.checks[2].expected_status, 404);
    assert_eq!(by_id.checks[2].resource, "Error");

    // Every other built-in route has no fixture configured
    let totals = report.totals();
    assert_eq!(totals.passed, 1);
    assert_eq!(totals.skipped, 9);
    assert_eq!(report.verdict().status, VerdictStatus::Pass);
}

#[test]
fn methods_run_in_alphabetical_order() {
    let server = mockito::Server::new();
    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({"base_url": server.url()}));

    let suite = Suite::setup(&config, &spec).unwrap();
    let names = suite.case_names();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);

    let report = suite.run(&Filter::default());
    let ran: Vec<&str> = report.cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(ran, sorted);
    assert_eq!(suite.cleanup(), 0);
}

#[test]
fn wrong_status_fails_the_method_only() {
    let mut server = mockito::Server::new();
    let _bad = json_mock(
        &mut server,
        "/students/12345/account-balance",
        500,
        r#"{"errors": []}"#,
    );
    let _holds_nf = json_mock(&mut server, "/students/999999999/holds", 404, NOT_FOUND_BODY);

    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": server.url(),
        "test_cases": {"valid_account_balance": ["12345"], "valid_holds": []}
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    let report = suite.run(&Filter::default());
    suite.cleanup();

    let by_id = report
        .cases
        .iter()
        .find(|c| c.name == "test_get_students_by_id")
        .unwrap();
    assert_eq!(by_id.status, CaseStatus::Failed);
    assert_eq!(
        by_id.message.as_deref(),
        Some("expected status 200, got 500 for /students/12345/account-balance")
    );
    // The method stopped at its first failing assertion
    assert_eq!(by_id.checks.len(), 1);

    // test_get_holds still ran (alphabetically before test_get_students_by_id)
    let holds = report
        .cases
        .iter()
        .find(|c| c.name == "test_get_holds")
        .unwrap();
    assert_eq!(holds.status, CaseStatus::Passed);

    let verdict = report.verdict();
    assert_eq!(verdict.status, VerdictStatus::Fail);
    assert_eq!(verdict.exit_code, 1);
}

#[test]
fn schema_mismatch_fails() {
    let mut server = mockito::Server::new();
    let _m = json_mock(
        &mut server,
        "/students/12345/account-balance",
        200,
        r#"{"data": {"id": 12345, "type": "gpa", "attributes": {}}}"#,
    );

    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": server.url(),
        "test_cases": {"valid_account_balance": ["12345"]}
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    let report = suite.run(&Filter {
        names: vec!["test_get_students_by_id".into()],
        ..Filter::default()
    });
    suite.cleanup();

    assert_eq!(report.cases.len(), 1);
    let case = &report.cases[0];
    assert_eq!(case.status, CaseStatus::Failed);
    let message = case.message.as_deref().unwrap();
    assert!(message.contains("does not match AccountBalanceResource"), "{message}");
}

#[test]
fn unknown_openapi_version_fails_setup() {
    let ws = Workspace::new();
    let spec = ws.write(
        "openapi.yaml",
        "info:\n  title: x\n  version: '1'\npaths: {}\n",
    );
    let config = ws.config(serde_json::json!({"base_url": "http://localhost:1"}));

    let err = Suite::setup(&config, &spec).unwrap_err();
    assert!(matches!(
        err,
        SuiteError::Resolve(ResolveError::UnknownVersion)
    ));
    assert_eq!(
        err.to_string(),
        "could not determine openapi document version"
    );
}

#[test]
fn openapi3_with_external_refs() {
    let mut server = mockito::Server::new();
    let _ok = json_mock(
        &mut server,
        "/students/931/account-balance",
        200,
        r#"{"data": {"id": "931", "attributes": {"currentBalance": null}}}"#,
    );
    let _nf = json_mock(&mut server, "/students/999999999", 404, NOT_FOUND_BODY);

    let ws = Workspace::new();
    ws.write("schemas/account-balance.yaml", ACCOUNT_BALANCE_YAML);
    ws.write("schemas/error.json", ERROR_JSON);
    let spec = ws.write("openapi.yaml", OPENAPI3);
    let config = ws.config(serde_json::json!({
        "base_url": server.url(),
        "test_cases": {"valid_account_balance": [931]}
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    assert_eq!(
        suite.context().spec.backend(),
        Backend::OpenApiSpecValidator
    );
    let report = suite.run(&Filter {
        patterns: vec!["students_by_id".into()],
        ..Filter::default()
    });
    suite.cleanup();

    assert_eq!(report.cases.len(), 1);
    assert_eq!(
        report.cases[0].status,
        CaseStatus::Passed,
        "{:?}",
        report.cases[0].message
    );
}

#[test]
fn unreachable_server_is_errored() {
    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": "http://127.0.0.1:9",
        "session": {"timeout_secs": 2},
        "test_cases": {"valid_account_balance": ["12345"]}
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    let report = suite.run(&Filter::default());
    assert_eq!(suite.cleanup(), 1);

    let case = report
        .cases
        .iter()
        .find(|c| c.name == "test_get_students_by_id")
        .unwrap();
    assert_eq!(case.status, CaseStatus::Errored);
    assert_eq!(case.checks[0].actual_status, None);
    assert_eq!(report.verdict().exit_code, 1);
}

#[test]
fn unknown_resource_schema_is_errored() {
    let mut server = mockito::Server::new();
    let _m = json_mock(&mut server, "/students/1/gpa", 200, "{}");

    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": server.url(),
        "test_cases": {"valid_gpa": ["1"]}
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    let report = suite.run(&Filter {
        names: vec!["test_get_gpa".into()],
        ..Filter::default()
    });
    suite.cleanup();

    let case = &report.cases[0];
    assert_eq!(case.status, CaseStatus::Errored);
    assert!(
        case.message
            .as_deref()
            .unwrap()
            .contains("GradePointAverageResult")
    );
}

#[test]
fn failfast_stops_after_first_failure() {
    let mut server = mockito::Server::new();
    // test_get_academic_status sorts first and fails on a 500
    let _m = json_mock(&mut server, "/students/1/academic-status", 500, "{}");

    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": server.url(),
        "test_cases": {
            "valid_academic_status": ["1"],
            "valid_account_balance": ["1"]
        }
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    let report = suite.run(&Filter {
        failfast: true,
        ..Filter::default()
    });
    assert_eq!(suite.cleanup(), 1);

    assert_eq!(report.cases.len(), 1);
    assert_eq!(report.cases[0].name, "test_get_academic_status");
    assert_eq!(report.cases[0].status, CaseStatus::Failed);
}

#[test]
fn configured_endpoints_replace_builtin_routes() {
    let mut server = mockito::Server::new();
    let _m = json_mock(
        &mut server,
        "/v2/balances/12345",
        200,
        &balance_body("12345"),
    );

    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": format!("{}/v2/", server.url()),
        "test_cases": {"balances": ["12345"]},
        "endpoints": [{
            "name": "test_balances",
            "path": "/balances/{id}",
            "fixture": "balances",
            "resource": "AccountBalanceResource"
        }]
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    assert_eq!(suite.case_names(), vec!["test_balances"]);
    let report = suite.run(&Filter::default());
    suite.cleanup();

    assert_eq!(report.cases[0].status, CaseStatus::Passed);
    assert_eq!(report.totals().requests, 1);
}

#[test]
fn plan_sends_nothing() {
    let mut server = mockito::Server::new();
    let untouched = server.mock("GET", mockito::Matcher::Any).expect(0).create();

    let ws = Workspace::new();
    let spec = ws.write("openapi.yaml", SWAGGER);
    let config = ws.config(serde_json::json!({
        "base_url": server.url(),
        "test_cases": {"valid_account_balance": ["12345"]}
    }));

    let suite = Suite::setup(&config, &spec).unwrap();
    let plan = suite.plan(&Filter::default());
    assert_eq!(suite.cleanup(), 0);

    untouched.assert();
    assert_eq!(plan.backend, "flex");
    assert_eq!(plan.requests.len(), 2);
    assert_eq!(plan.skipped.len(), 9);
}
