//! Validation backend selection by document version

use jsonschema::Draft;
use serde_json::Value;

use super::ResolveError;

/// Validation backend, chosen from the document's top-level version key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Swagger 2.0 (`swagger` key): schemas under `definitions`
    Flex,
    /// OpenAPI 3.x (`openapi` key): schemas under `components/schemas`
    OpenApiSpecValidator,
}

impl Backend {
    /// Select the backend from the top-level `swagger` / `openapi` key.
    ///
    /// # Errors
    ///
    /// [`ResolveError::UnknownVersion`] if neither key is present.
    pub fn detect(document: &Value) -> Result<Self, ResolveError> {
        if document.get("swagger").is_some() {
            Ok(Self::Flex)
        } else if document.get("openapi").is_some() {
            Ok(Self::OpenApiSpecValidator)
        } else {
            Err(ResolveError::UnknownVersion)
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flex => "flex",
            Self::OpenApiSpecValidator => "openapi-spec-validator",
        }
    }

    /// Version string as written in the document, e.g. "2.0" or "3.0.3".
    #[must_use]
    pub fn version(self, document: &Value) -> String {
        let key = match self {
            Self::Flex => "swagger",
            Self::OpenApiSpecValidator => "openapi",
        };
        match document.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Structural checks every document for this backend must pass.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidDocument`] listing every problem found.
    pub fn check_document(self, document: &Value) -> Result<(), ResolveError> {
        let mut problems = Vec::new();
        let version = self.version(document);

        match self {
            Self::Flex => {
                // `swagger: 2.0` unquoted in YAML parses as a float
                let is_two = version == "2.0"
                    || document.get("swagger").and_then(Value::as_f64) == Some(2.0);
                if !is_two {
                    problems.push(format!("swagger version must be \"2.0\", found {version}"));
                }
            }
            Self::OpenApiSpecValidator => {
                if !version.starts_with("3.") {
                    problems.push(format!("openapi version must be 3.x, found {version}"));
                }
            }
        }

        let info = document.get("info");
        for field in ["title", "version"] {
            if info.and_then(|i| i.get(field)).is_none() {
                problems.push(format!("info.{field} is required"));
            }
        }

        if !document.get("paths").is_some_and(Value::is_object) {
            problems.push("paths must be an object".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::InvalidDocument {
                backend: self.as_str(),
                problems: problems.join("; "),
            })
        }
    }

    /// Top-level key holding the named schemas.
    pub(super) const fn components_key(self) -> &'static str {
        match self {
            Self::Flex => "definitions",
            Self::OpenApiSpecValidator => "components",
        }
    }

    /// JSON pointer to a named schema.
    pub(super) fn schema_pointer(self, name: &str) -> String {
        let escaped = name.replace('~', "~0").replace('/', "~1");
        match self {
            Self::Flex => format!("/definitions/{escaped}"),
            Self::OpenApiSpecValidator => format!("/components/schemas/{escaped}"),
        }
    }

    /// JSON Schema draft used to compile response schemas.
    ///
    /// Swagger 2.0 and OpenAPI 3.0 schemas are Draft 4 supersets; 3.1 is 2020-12.
    pub(super) fn draft(self, version: &str) -> Draft {
        match self {
            Self::OpenApiSpecValidator if version.starts_with("3.1") => Draft::Draft202012,
            _ => Draft::Draft4,
        }
    }

    /// Rewrite the dialect's nullable marker into plain JSON Schema.
    pub(super) fn normalize(self, schema: &mut Value) {
        let marker = match self {
            Self::Flex => "x-nullable",
            Self::OpenApiSpecValidator => "nullable",
        };
        widen_nullable(schema, marker);
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{"type": "string", "nullable": true}` → `{"type": ["string", "null"], ...}`
///
/// Without a `type` (e.g. `nullable` next to `allOf`) the schema becomes
/// `{"anyOf": [{"type": "null"}, <schema>]}`.
fn widen_nullable(value: &mut Value, marker: &str) {
    match value {
        Value::Object(obj) => {
            let nullable = obj.get(marker).and_then(Value::as_bool) == Some(true);
            if nullable && !obj.contains_key("type") {
                obj.remove(marker);
                let mut rest = Value::Object(std::mem::take(obj));
                widen_nullable(&mut rest, marker);
                *value = serde_json::json!({"anyOf": [{"type": "null"}, rest]});
                return;
            }
            if nullable {
                let widened = match obj.get("type") {
                    Some(Value::String(ty)) => Some(vec![Value::from(ty.as_str()), Value::from("null")]),
                    Some(Value::Array(types)) if !types.iter().any(|t| t == "null") => {
                        let mut types = types.clone();
                        types.push(Value::from("null"));
                        Some(types)
                    }
                    _ => None,
                };
                if let Some(types) = widened {
                    obj.insert("type".to_string(), Value::Array(types));
                }
                if let Some(Value::Array(variants)) = obj.get_mut("enum") {
                    if !variants.contains(&Value::Null) {
                        variants.push(Value::Null);
                    }
                }
            }
            for child in obj.values_mut() {
                widen_nullable(child, marker);
            }
        }
        Value::Array(items) => {
            for item in items {
                widen_nullable(item, marker);
            }
        }
        _ => {}
    }
}
