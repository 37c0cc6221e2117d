//! Harness configuration: target server, session parameters, test fixtures

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Identifier used to probe the not-found path of every endpoint.
pub const DEFAULT_NOT_FOUND_ID: &str = "999999999";

/// Client timeout applied when `session.timeout_secs` is unset.
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// Harness configuration, loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the API under test, e.g. "https://api.example.edu/v1"
    pub base_url: String,

    /// Base URL used instead of `base_url` when `local_test` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_base_url: Option<String>,

    /// HTTP session parameters (auth, headers, timeout)
    #[serde(default)]
    pub session: SessionConfig,

    /// Fixture name → identifiers, e.g. "valid_account_balance" → ["12345"]
    #[serde(default)]
    pub test_cases: BTreeMap<String, Vec<FixtureId>>,

    /// Run against a local server instead of the deployed one
    #[serde(default)]
    pub local_test: bool,

    /// Identifier expected to match no resource (default "999999999")
    #[serde(default = "default_not_found_id")]
    pub not_found_id: String,

    /// Endpoint table. Empty means the built-in student routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<EndpointCase>,
}

/// HTTP session parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Sent as `Authorization: Bearer <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,

    /// Whole-request timeout in seconds (default 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,

    /// Verify TLS certificates. Defaults to `true`, or `false` when `local_test` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// A fixture identifier. Accepts JSON strings and integers; stored as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FixtureId(String);

impl FixtureId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FixtureId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for FixtureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FixtureId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Signed(n) => Self(n.to_string()),
            Raw::Unsigned(n) => Self(n.to_string()),
        })
    }
}

/// One endpoint under test: a route, the fixture that drives it and the
/// schemas its responses must match.
///
/// ```json
/// {
///   "name": "test_get_gpa",
///   "path": "/students/{id}/gpa",
///   "fixture": "valid_gpa",
///   "resource": "GradePointAverageResult",
///   "not_found_path": "/students/{id}/gpa"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCase {
    /// Test method name, used for ordering and filtering
    pub name: String,

    /// Path template relative to the base URL; `{id}` is replaced by each fixture
    pub path: String,

    /// Key into `test_cases`
    pub fixture: String,

    /// Schema name the 200 response must match
    pub resource: String,

    /// Path template probed with the not-found identifier (expects 404)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_path: Option<String>,

    /// Schema name the 404 response must match
    #[serde(default = "default_error_resource")]
    pub error_resource: String,
}

impl EndpointCase {
    /// Path for one fixture ID; the ID is encoded as a single path segment.
    #[must_use]
    pub fn path_for(&self, id: &str) -> String {
        self.path.replace("{id}", &encode_segment(id))
    }

    #[must_use]
    pub fn not_found_path_for(&self, id: &str) -> Option<String> {
        self.not_found_path
            .as_ref()
            .map(|p| p.replace("{id}", &encode_segment(id)))
    }
}

/// Percent-encode `id` so `/`, `?` and `#` in it cannot change the route.
fn encode_segment(id: &str) -> String {
    // `push` drops dot segments instead of encoding them
    if matches!(id, "." | "..") {
        return id.replace('.', "%2E");
    }
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return id.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(id);
    }
    url.path().trim_start_matches('/').to_string()
}

fn default_not_found_id() -> String {
    DEFAULT_NOT_FOUND_ID.to_string()
}

fn default_error_resource() -> String {
    "Error".to_string()
}

impl Config {
    /// Load config from file. `.toml` files are parsed as TOML, anything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from the first default location that exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        for name in DEFAULT_CANDIDATES {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }
        Err(ConfigError::NotFound(DEFAULT_CANDIDATES.join(", ")))
    }

    /// Base URL in effect for this run, without a trailing slash.
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        let url = match (&self.local_base_url, self.local_test) {
            (Some(local), true) => local.as_str(),
            _ => self.base_url.as_str(),
        };
        url.trim_end_matches('/')
    }

    #[must_use]
    pub fn verify_tls(&self) -> bool {
        self.session.verify_tls.unwrap_or(!self.local_test)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        let secs = self
            .session
            .timeout_secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs_f64(secs)
    }

    /// Identifiers for a fixture, or `None` if the fixture is not configured.
    #[must_use]
    pub fn fixture(&self, name: &str) -> Option<&[FixtureId]> {
        self.test_cases.get(name).map(Vec::as_slice)
    }

    /// Check the loaded values for problems that would make every request fail.
    ///
    /// # Errors
    ///
    /// Returns every problem found, joined into one message
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        for (field, url) in [
            ("base_url", Some(&self.base_url)),
            ("local_base_url", self.local_base_url.as_ref()),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    problems.push(format!("{field}: {url} (missing http:// or https:// prefix)"));
                }
            }
        }

        if let Some(secs) = self.session.timeout_secs {
            if !secs.is_finite() || secs <= 0.0 {
                problems.push(format!("session.timeout_secs: {secs} (must be > 0)"));
            }
        }

        if self.not_found_id.is_empty() {
            problems.push("not_found_id: must not be empty".to_string());
        }

        for case in &self.endpoints {
            if !case.path.starts_with('/') {
                problems.push(format!("endpoints.{}: path must start with '/'", case.name));
            }
            if !case.path.contains("{id}") {
                problems.push(format!("endpoints.{}: path has no {{id}} placeholder", case.name));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    /// Example config file written by `apicheck init`.
    pub fn example() -> &'static str {
        r#"{
  "base_url": "https://api.example.edu/v1",
  "local_base_url": "http://localhost:8080/api/v1",
  "local_test": false,
  "session": {
    "bearer_token": "your-token-here",
    "headers": {
      "Accept": "application/json"
    },
    "timeout_secs": 10
  },
  "test_cases": {
    "valid_account_balance": ["12345"],
    "valid_gpa": ["12345"],
    "valid_holds": ["12345"]
  }
}
"#
    }
}

const DEFAULT_CANDIDATES: [&str; 3] = ["apicheck.json", ".apicheck.json", "apicheck.toml"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("No config file found (tried {0})")]
    NotFound(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
