//! The one HTTP session shared by every test method

use std::cell::Cell;
use std::time::Instant;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info};

use apicheck_core::{BasicAuth, Config};

/// A received response, body already read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Round-trip time in seconds
    pub elapsed: f64,
}

/// Blocking HTTP client bound to the configured base URL.
///
/// Opened once at suite setup and consumed by [`Session::close`].
#[derive(Debug)]
pub struct Session {
    client: reqwest::blocking::Client,
    base_url: String,
    basic_auth: Option<BasicAuth>,
    requests: Cell<u64>,
}

impl Session {
    /// Build the client from the config's session parameters.
    ///
    /// # Errors
    ///
    /// Returns error if a configured header is not valid HTTP or the client
    /// cannot be built.
    pub fn open(config: &Config) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.session.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SessionError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SessionError::InvalidHeader(format!("{name}: {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &config.session.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| SessionError::InvalidHeader(format!("bearer_token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let verify_tls = config.verify_tls();
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| SessionError::Build(e.to_string()))?;

        let base_url = config.effective_base_url().to_string();
        info!(
            base_url = %base_url,
            local_test = config.local_test,
            verify_tls,
            timeout_secs = config.timeout().as_secs_f64(),
            "session opened"
        );

        Ok(Self {
            client,
            base_url,
            basic_auth: config.session.basic_auth.clone(),
            requests: Cell::new(0),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one GET. No retries.
    ///
    /// # Errors
    ///
    /// [`SessionError::Transport`] if no response arrives (connection refused,
    /// timeout, unreadable body).
    pub fn get(&self, path: &str) -> Result<HttpResponse, SessionError> {
        let url = self.url(path);
        let mut req = self.client.get(&url);
        if let Some(auth) = &self.basic_auth {
            req = req.basic_auth(&auth.username, auth.password.as_ref());
        }

        self.requests.set(self.requests.get() + 1);
        let start = Instant::now();
        let resp = req
            .send()
            .map_err(|e| SessionError::Transport(format!("GET {url}: {e}")))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp
            .text()
            .map_err(|e| SessionError::Transport(format!("GET {url}: reading body: {e}")))?;
        let elapsed = start.elapsed().as_secs_f64();

        debug!(
            url = %url,
            status,
            content_type = %content_type,
            elapsed_ms = elapsed * 1000.0,
            bytes = body.len(),
            "response"
        );

        Ok(HttpResponse {
            status,
            body,
            elapsed,
        })
    }

    /// Requests issued so far.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests.get()
    }

    /// Close the session, returning the number of requests it issued.
    pub fn close(self) -> u64 {
        let requests = self.requests.get();
        info!(requests, "session closed");
        requests
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid header {0}")]
    InvalidHeader(String),
    #[error("Cannot build HTTP client: {0}")]
    Build(String),
    #[error("HTTP error: {0}")]
    Transport(String),
}
