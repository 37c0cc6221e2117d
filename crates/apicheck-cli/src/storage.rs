//! Report persistence for `apicheck run --report-dir`
//!
//! Directory layout: `{report_dir}/{host_port}_{unix_secs}/`, with a `_N`
//! suffix when a run from the same second already exists.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use apicheck_core::{SuiteReport, Verdict};

/// Everything needed to persist one run.
pub struct ReportData<'a> {
    pub base_url: &'a str,
    pub openapi: &'a Path,
    pub backend: &'a str,
    pub report: &'a SuiteReport,
    pub verdict: &'a Verdict,
    pub requests: u64,
}

/// Write `summary.json` (and `failures.json` if anything failed) into a new
/// run directory under `base`.
///
/// Returns the run directory on success.
pub fn save_report(base: &Path, data: &ReportData) -> Result<PathBuf, std::io::Error> {
    let ts = unix_secs();
    let report_dir = create_run_dir(base, &build_dir_name(data.base_url, ts))?;

    let totals = data.report.totals();
    let summary = serde_json::json!({
        "verdict": data.verdict,
        "totals": totals,
        "meta": {
            "timestamp": ts,
            "duration_secs": data.report.duration_secs,
            "base_url": data.base_url,
            "openapi": data.openapi.display().to_string(),
            "backend": data.backend,
            "requests": data.requests,
        },
        "cases": data.report.cases,
    });
    std::fs::write(
        report_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary).map_err(std::io::Error::other)?,
    )?;

    let failures: Vec<_> = data.report.unsuccessful().collect();
    if !failures.is_empty() {
        std::fs::write(
            report_dir.join("failures.json"),
            serde_json::to_string_pretty(&failures).map_err(std::io::Error::other)?,
        )?;
    }

    Ok(report_dir)
}

/// Create a fresh run directory under `base`; never reuses an existing one.
fn create_run_dir(base: &Path, name: &str) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(base)?;
    let mut attempt = 0u32;
    loop {
        let dir = if attempt == 0 {
            base.join(name)
        } else {
            base.join(format!("{name}_{attempt}"))
        };
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// `{host_port}_{unix_secs}` e.g. `localhost_8080_1760000000`
fn build_dir_name(base_url: &str, ts: u64) -> String {
    format!("{}_{ts}", extract_host_port(base_url))
}

/// `"http://localhost:8080/path"` → `"localhost_8080"`
fn extract_host_port(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .filter(|h| !h.is_empty())
        .unwrap_or("unknown")
        .replace(':', "_")
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
