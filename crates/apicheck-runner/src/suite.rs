//! Suite lifecycle: setup once, run the selected test methods, clean up once

use std::path::Path;
use std::time::Instant;

use apicheck_core::{CaseResult, Config, ConfigError, DryRunPlan, EndpointCase, SuiteReport};
use tracing::info;

use crate::cases::{builtin_cases, requests_for, run_case};
use crate::openapi::{ResolveError, ResolvedSpec};
use crate::session::{Session, SessionError};

/// Everything the test methods share, read-only, for the whole run.
#[derive(Debug)]
pub struct SuiteContext {
    pub config: Config,
    pub spec: ResolvedSpec,
    pub session: Session,
}

/// Which test methods to run.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Run methods whose name contains any of these (`-k`)
    pub patterns: Vec<String>,
    /// Run exactly these methods
    pub names: Vec<String>,
    /// Stop after the first failed or errored method
    pub failfast: bool,
}

impl Filter {
    /// A method is selected when no selector is given, or any selector matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.patterns.is_empty() && self.names.is_empty() {
            return true;
        }
        self.names.iter().any(|n| n == name) || self.patterns.iter().any(|p| name.contains(p))
    }
}

/// A set up suite. Dropping it without [`Suite::cleanup`] still releases the
/// client, but `cleanup` is where the session is closed and logged.
#[derive(Debug)]
pub struct Suite {
    ctx: SuiteContext,
    cases: Vec<EndpointCase>,
}

impl Suite {
    /// Load the config, resolve the OpenAPI document and open the session.
    ///
    /// # Errors
    ///
    /// Any setup failure; no test method runs without a complete context.
    pub fn setup(config_path: &Path, openapi_path: &Path) -> Result<Self, SuiteError> {
        let config = Config::load(config_path)?;
        let spec = ResolvedSpec::load(openapi_path)?;
        Self::from_parts(config, spec)
    }

    /// Set up from an already loaded config and document.
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or the session cannot be opened.
    pub fn from_parts(config: Config, spec: ResolvedSpec) -> Result<Self, SuiteError> {
        config.validate()?;

        let mut cases = if config.endpoints.is_empty() {
            builtin_cases()
        } else {
            config.endpoints.clone()
        };
        // Test methods run in alphabetical order
        cases.sort_by(|a, b| a.name.cmp(&b.name));

        let session = Session::open(&config)?;

        Ok(Self {
            ctx: SuiteContext {
                config,
                spec,
                session,
            },
            cases,
        })
    }

    #[must_use]
    pub fn context(&self) -> &SuiteContext {
        &self.ctx
    }

    /// Test method names in execution order.
    #[must_use]
    pub fn case_names(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name.as_str()).collect()
    }

    /// Requests a run with `filter` would make. Sends nothing.
    #[must_use]
    pub fn plan(&self, filter: &Filter) -> DryRunPlan {
        let mut requests = Vec::new();
        let mut skipped = Vec::new();

        for case in self.selected(filter) {
            match requests_for(&self.ctx.config, case) {
                Ok(r) => requests.extend(r),
                Err(reason) => skipped.push((case.name.clone(), reason)),
            }
        }

        DryRunPlan {
            base_url: self.ctx.session.base_url().to_string(),
            backend: self.ctx.spec.backend().as_str().to_string(),
            requests,
            skipped,
        }
    }

    /// Run the selected methods in order. One method's failure does not stop
    /// the rest unless `filter.failfast` is set.
    #[must_use]
    pub fn run(&self, filter: &Filter) -> SuiteReport {
        let selected: Vec<&EndpointCase> = self.selected(filter).collect();
        info!(
            methods = selected.len(),
            base_url = %self.ctx.session.base_url(),
            "running test methods"
        );

        let start = Instant::now();
        let mut results: Vec<CaseResult> = Vec::with_capacity(selected.len());
        for case in selected {
            let result = run_case(&self.ctx, case);
            info!(case = %result.name, status = %result.status, "finished");
            let stop = filter.failfast && !result.status.is_success();
            results.push(result);
            if stop {
                info!("stopping after first failure (failfast)");
                break;
            }
        }

        SuiteReport {
            cases: results,
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Close the session. Consumes the suite, so it happens exactly once.
    ///
    /// Returns the number of requests the session issued.
    pub fn cleanup(self) -> u64 {
        self.ctx.session.close()
    }

    fn selected<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = &'a EndpointCase> {
        self.cases.iter().filter(move |c| filter.matches(&c.name))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
