//! `$ref` resolution across the root document and the files it references

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::{ResolveError, parse_document};

/// Replace every `$ref` in `root` with its target.
///
/// `root_path` is the document's own location; relative file references are
/// resolved against its directory. A `#/...` reference to a target on a
/// reference cycle inside the root document is left as `$ref` for the schema
/// validator to follow. A loop through another file is an error.
pub(super) fn resolve_document(root: Value, root_path: &Path) -> Result<Value, ResolveError> {
    let mut resolver = RefResolver {
        root: root_path.to_path_buf(),
        documents: HashMap::new(),
        expanded: HashMap::new(),
        cyclic: HashSet::new(),
    };
    resolver.documents.insert(root_path.to_path_buf(), root.clone());
    resolver.resolve_value(&root, root_path, &mut Vec::new())
}

struct RefResolver {
    root: PathBuf,
    /// Parsed documents by path; each external file is read once
    documents: HashMap<PathBuf, Value>,
    /// Finished expansions of targets not on a cycle. These never depend on
    /// the ref stack, so each target is expanded once.
    expanded: HashMap<Frame, Value>,
    /// Targets found on a reference cycle
    cyclic: HashSet<Frame>,
}

/// A ref target currently being expanded: document + JSON pointer.
type Frame = (PathBuf, String);

impl RefResolver {
    fn resolve_value(
        &mut self,
        value: &Value,
        doc: &Path,
        stack: &mut Vec<Frame>,
    ) -> Result<Value, ResolveError> {
        match value {
            Value::Object(obj) => {
                if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                    return self.resolve_ref(reference, value, doc, stack);
                }
                let mut resolved = serde_json::Map::with_capacity(obj.len());
                for (k, v) in obj {
                    resolved.insert(k.clone(), self.resolve_value(v, doc, stack)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| self.resolve_value(v, doc, stack))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Ok(value.clone()),
        }
    }

    fn resolve_ref(
        &mut self,
        reference: &str,
        original: &Value,
        doc: &Path,
        stack: &mut Vec<Frame>,
    ) -> Result<Value, ResolveError> {
        let frame = self.locate(reference, doc)?;
        // Only `#/...` refs into the root document stay valid once inlined
        let keepable = frame.0 == self.root && reference.starts_with('#');

        if let Some(pos) = stack.iter().position(|f| *f == frame) {
            if !keepable {
                return Err(ResolveError::RecursiveRef(reference.to_string()));
            }
            debug!(reference, "recursive $ref left in place");
            self.cyclic.extend(stack[pos..].iter().cloned());
            return Ok(original.clone());
        }
        if keepable && self.cyclic.contains(&frame) {
            return Ok(original.clone());
        }
        if let Some(done) = self.expanded.get(&frame) {
            return Ok(done.clone());
        }

        let target = self
            .documents
            .get(&frame.0)
            .and_then(|d| d.pointer(&frame.1))
            .cloned()
            .ok_or_else(|| ResolveError::Ref {
                reference: reference.to_string(),
                reason: format!("no value at '{}' in {}", frame.1, frame.0.display()),
            })?;

        let target_doc = frame.0.clone();
        stack.push(frame.clone());
        let resolved = self.resolve_value(&target, &target_doc, stack);
        stack.pop();
        let resolved = resolved?;

        if self.cyclic.contains(&frame) {
            return Ok(if keepable { original.clone() } else { resolved });
        }
        self.expanded.insert(frame, resolved.clone());
        Ok(resolved)
    }

    /// Split a reference into (document path, decoded JSON pointer), loading
    /// the document if it has not been seen yet.
    fn locate(&mut self, reference: &str, doc: &Path) -> Result<Frame, ResolveError> {
        let (file, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let pointer = percent_decode(fragment);

        if file.is_empty() {
            return Ok((doc.to_path_buf(), pointer));
        }

        if file.starts_with("http://") || file.starts_with("https://") {
            return Err(ResolveError::Ref {
                reference: reference.to_string(),
                reason: "remote references are not supported".to_string(),
            });
        }

        let base = doc.parent().unwrap_or_else(|| Path::new("."));
        let path = std::fs::canonicalize(base.join(file)).map_err(|e| ResolveError::Ref {
            reference: reference.to_string(),
            reason: format!("{}: {e}", base.join(file).display()),
        })?;

        if !self.documents.contains_key(&path) {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| ResolveError::Io(format!("{}: {e}", path.display())))?;
            let parsed = parse_document(&path, &content)?;
            debug!(file = %path.display(), "loaded external document");
            self.documents.insert(path.clone(), parsed);
        }

        Ok((path, pointer))
    }
}

/// Decode `%XX` escapes in a URI fragment. Invalid escapes are kept verbatim.
fn percent_decode(fragment: &str) -> String {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = fragment
                .get(i + 1..i + 3)
                .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()));
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
