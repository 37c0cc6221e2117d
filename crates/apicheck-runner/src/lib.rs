//! apicheck-runner: resolve the OpenAPI document, open the session and run
//! the endpoint test methods

pub mod cases;
pub mod endpoint;
pub mod openapi;
pub mod session;
pub mod suite;

pub use openapi::{Backend, ResolveError, ResolvedSpec};
pub use session::{Session, SessionError};
pub use suite::{Filter, Suite, SuiteContext, SuiteError};
