//! OpenAPI / Swagger document loading
//!
//! Parses the document (YAML or JSON), detects its version to pick a
//! [`Backend`], dereferences every `$ref` once, and then serves response
//! schemas by resource name.

mod backend;
mod resolve;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

pub use backend::Backend;

/// Validation errors reported per response, at most.
const MAX_VALIDATION_ERRORS: usize = 5;

/// A fully dereferenced OpenAPI document.
///
/// Built once per run; the compiled validator cache is the only thing that
/// changes afterwards.
pub struct ResolvedSpec {
    backend: Backend,
    version: String,
    source: PathBuf,
    document: Value,
    validators: RefCell<HashMap<String, jsonschema::Validator>>,
}

impl std::fmt::Debug for ResolvedSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSpec")
            .field("backend", &self.backend)
            .field("version", &self.version)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl ResolvedSpec {
    /// Read, version-check and dereference the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, carries neither a
    /// `swagger` nor an `openapi` key, fails the backend's structural checks,
    /// or contains a `$ref` that cannot be resolved.
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let source = std::fs::canonicalize(path)
            .map_err(|e| ResolveError::Io(format!("{}: {e}", path.display())))?;
        let content = std::fs::read_to_string(&source)
            .map_err(|e| ResolveError::Io(format!("{}: {e}", source.display())))?;
        let raw = parse_document(&source, &content)?;
        Self::from_document(raw, source)
    }

    /// Build from an already parsed document. `source` is used to resolve
    /// relative file references.
    ///
    /// # Errors
    ///
    /// Same as [`ResolvedSpec::load`], minus reading the root file.
    pub fn from_document(raw: Value, source: PathBuf) -> Result<Self, ResolveError> {
        let backend = Backend::detect(&raw)?;
        let version = backend.version(&raw);
        backend.check_document(&raw)?;

        let document = resolve::resolve_document(raw, &source)?;

        info!(
            backend = backend.as_str(),
            version = %version,
            spec = %source.display(),
            "openapi document resolved"
        );

        Ok(Self {
            backend,
            version,
            source,
            document,
            validators: RefCell::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Dereferenced schema for a resource name, e.g. "AccountBalanceResource".
    ///
    /// # Errors
    ///
    /// [`ResolveError::UnknownSchema`] if the document has no such schema.
    pub fn schema(&self, name: &str) -> Result<&Value, ResolveError> {
        self.document
            .pointer(&self.backend.schema_pointer(name))
            .ok_or_else(|| {
                ResolveError::UnknownSchema(name.to_string(), self.source.display().to_string())
            })
    }

    /// Names of all schemas the document defines.
    #[must_use]
    pub fn schema_names(&self) -> Vec<&str> {
        let schemas = match self.backend {
            Backend::Flex => self.document.get("definitions"),
            Backend::OpenApiSpecValidator => self
                .document
                .get("components")
                .and_then(|c| c.get("schemas")),
        };
        schemas
            .and_then(Value::as_object)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Validate `body` against the named schema.
    ///
    /// Returns the validation errors (at most 5); empty means the body conforms.
    ///
    /// # Errors
    ///
    /// Returns error if the schema does not exist or does not compile.
    pub fn validate(&self, resource: &str, body: &Value) -> Result<Vec<String>, ResolveError> {
        let mut cache = self.validators.borrow_mut();
        if !cache.contains_key(resource) {
            let validator = self.compile(resource)?;
            cache.insert(resource.to_string(), validator);
        }
        let validator = &cache[resource];

        Ok(validator
            .iter_errors(body)
            .take(MAX_VALIDATION_ERRORS)
            .map(|e| e.to_string())
            .collect())
    }

    fn compile(&self, resource: &str) -> Result<jsonschema::Validator, ResolveError> {
        let mut schema = self.schema(resource)?.clone();

        // Recursive refs stay as `#/...` pointers into the document; embed the
        // component map so they still resolve from the schema's own root.
        if contains_ref(&schema) {
            if let (Value::Object(obj), Some(components)) = (
                &mut schema,
                self.document.get(self.backend.components_key()),
            ) {
                obj.entry(self.backend.components_key())
                    .or_insert_with(|| components.clone());
            }
        }
        self.backend.normalize(&mut schema);

        debug!(resource, backend = self.backend.as_str(), "compiling response schema");

        jsonschema::options()
            .with_draft(self.backend.draft(&self.version))
            .should_validate_formats(false)
            .build(&schema)
            .map_err(|e| ResolveError::Compile(resource.to_string(), e.to_string()))
    }
}

fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(obj) => obj.contains_key("$ref") || obj.values().any(contains_ref),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

/// Parse an OpenAPI document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then fall
/// back to content sniffing (leading `{` → JSON, otherwise YAML).
pub(crate) fn parse_document(path: &Path, content: &str) -> Result<Value, ResolveError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parse_yaml = |content: &str| -> Result<Value, ResolveError> {
        serde_yml::from_str(content).map_err(|e| {
            ResolveError::Parse(format!("{}: invalid YAML: {e}", path.display()))
        })
    };
    let parse_json = |content: &str| -> Result<Value, ResolveError> {
        serde_json::from_str(content).map_err(|e| {
            ResolveError::Parse(format!("{}: invalid JSON: {e}", path.display()))
        })
    };

    match ext.as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "json" => parse_json(content),
        _ if content.trim_start().starts_with('{') => parse_json(content),
        _ => parse_yaml(content),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("could not determine openapi document version")]
    UnknownVersion,
    #[error("Invalid {backend} document: {problems}")]
    InvalidDocument {
        backend: &'static str,
        problems: String,
    },
    #[error("Cannot resolve $ref '{reference}': {reason}")]
    Ref { reference: String, reason: String },
    #[error("Recursive $ref '{0}' through an external document")]
    RecursiveRef(String),
    #[error("Schema '{0}' not found in {1}")]
    UnknownSchema(String, String),
    #[error("Schema '{0}' does not compile: {1}")]
    Compile(String, String),
}
