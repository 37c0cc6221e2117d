//! Endpoint assertions: status code, then response body vs resource schema
//!
//! [`evaluate`] is pure; [`test_endpoint`] adds the one request.

use apicheck_core::CheckRecord;

use crate::openapi::{ResolveError, ResolvedSpec};
use crate::session::{HttpResponse, Session, SessionError};

/// Longest body excerpt quoted in a failure message.
const BODY_PREVIEW_BYTES: usize = 200;

/// Input for the endpoint assertions. Pure data.
pub struct CheckInput<'a> {
    pub path: &'a str,
    pub resource: &'a str,
    pub expected_status: u16,
    pub status: u16,
    pub body_text: &'a str,
}

/// Run the assertions in order. The first failing one ends the check, so the
/// result holds at most one failure message.
///
/// # Errors
///
/// Returns error if the resource schema is missing from the document or does
/// not compile; that is a broken harness, not a failed assertion.
pub fn evaluate(spec: &ResolvedSpec, input: &CheckInput) -> Result<Option<String>, ResolveError> {
    // ── 1: status code ──
    if input.status != input.expected_status {
        return Ok(Some(format!(
            "expected status {}, got {} for {}",
            input.expected_status, input.status, input.path
        )));
    }

    // ── 2: body is JSON ──
    let body: serde_json::Value = match serde_json::from_str(input.body_text) {
        Ok(v) => v,
        Err(e) => {
            return Ok(Some(format!(
                "response body for {} is not valid JSON ({e}): {}",
                input.path,
                preview(input.body_text)
            )));
        }
    };

    // ── 3: body matches the resource schema ──
    let errors = spec.validate(input.resource, &body)?;
    if errors.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "response body for {} does not match {}: {}",
            input.path,
            input.resource,
            errors.join("; ")
        )))
    }
}

/// GET `path` through the shared session and assert status + schema.
///
/// # Errors
///
/// Transport failures and missing schemas; assertion failures are reported in
/// the returned record instead.
pub fn test_endpoint(
    session: &Session,
    spec: &ResolvedSpec,
    path: &str,
    resource: &str,
    expected_status: u16,
) -> Result<CheckRecord, EndpointError> {
    let HttpResponse {
        status,
        body,
        elapsed,
        ..
    } = session.get(path)?;

    let failure = evaluate(
        spec,
        &CheckInput {
            path,
            resource,
            expected_status,
            status,
            body_text: &body,
        },
    )?;

    Ok(CheckRecord {
        path: path.to_string(),
        resource: resource.to_string(),
        expected_status,
        actual_status: Some(status),
        elapsed_secs: Some(elapsed),
        failures: failure.into_iter().collect(),
    })
}

/// Safe UTF-8 truncation for failure messages.
fn preview(body: &str) -> String {
    if body.is_empty() {
        return "<empty>".to_string();
    }
    if body.len() <= BODY_PREVIEW_BYTES {
        return body.to_string();
    }
    let mut end = BODY_PREVIEW_BYTES;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…({} bytes total)", &body[..end], body.len())
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Spec(#[from] ResolveError),
}
