//! Pluggable configuration file loading.
//!
//! A configuration file is anything that evaluates to a mapping. The
//! `FileLoader` trait abstracts over the serialization: the built-in
//! implementations cover JSON, YAML, and TOML, and embedders can
//! register their own per file extension. Every read or parse failure is
//! escalated to `Error::FileEvaluation` so that a malformed file can
//! never contribute a partial document to the merge.
//!
//! ## Params references
//!
//! While a file is evaluated, an `EvalContext` carries a read-only
//! snapshot of the already-built params group. String scalars may
//! reference it with `${params.dotted.path}`:
//!
//! - a string that consists of exactly one reference is substituted by
//!   the referenced value, preserving its type;
//! - a reference embedded in a longer string is substituted by the
//!   scalar's string form;
//! - an unresolvable reference, or a non-scalar embedded in a longer
//!   string, fails the evaluation.
//!
//! Tokens outside the `params` namespace (for example `${HOME}`) are
//! left untouched. While the params group itself is being built, no
//! params snapshot is exposed and all tokens stay literal.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Read-only evaluation context passed to every loader call.
#[derive(Debug, Default)]
pub struct EvalContext<'a> {
    params: Option<&'a Value>,
}

impl<'a> EvalContext<'a> {
    /// A context without any ambient bindings.
    pub fn new() -> Self {
        Self { params: None }
    }

    /// A context exposing the built params mapping.
    pub fn with_params(params: &'a Value) -> Self {
        Self {
            params: Some(params),
        }
    }

    /// The params snapshot, when exposed.
    pub fn params(&self) -> Option<&Value> {
        self.params
    }
}

/// Loads one configuration file into a mapping value.
pub trait FileLoader {
    /// Load and evaluate the file.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileEvaluation` when the file cannot be read,
    /// parsed, is not a mapping at the top level, or contains an invalid
    /// params reference.
    fn load(&self, path: &Path, context: &EvalContext<'_>) -> Result<Value>;
}

/// JSON configuration files.
pub struct JsonLoader;

impl FileLoader for JsonLoader {
    fn load(&self, path: &Path, context: &EvalContext<'_>) -> Result<Value> {
        let source = read_source(path)?;
        let value: Value =
            serde_json::from_str(&source).map_err(|err| evaluation_error(path, &err))?;
        finish(path, value, context)
    }
}

/// YAML configuration files.
pub struct YamlLoader;

impl FileLoader for YamlLoader {
    fn load(&self, path: &Path, context: &EvalContext<'_>) -> Result<Value> {
        let source = read_source(path)?;
        let value: Value =
            serde_yaml::from_str(&source).map_err(|err| evaluation_error(path, &err))?;
        finish(path, value, context)
    }
}

/// TOML configuration files.
pub struct TomlLoader;

impl FileLoader for TomlLoader {
    fn load(&self, path: &Path, context: &EvalContext<'_>) -> Result<Value> {
        let source = read_source(path)?;
        let value: toml::Value =
            toml::from_str(&source).map_err(|err| evaluation_error(path, &err))?;
        let value = serde_json::to_value(value).map_err(|err| evaluation_error(path, &err))?;
        finish(path, value, context)
    }
}

/// Dispatches loading by file extension.
pub struct LoaderRegistry {
    loaders: HashMap<String, Box<dyn FileLoader>>,
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<&String> = self.loaders.keys().collect();
        extensions.sort();
        f.debug_struct("LoaderRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

impl LoaderRegistry {
    /// An empty registry. Useful for embedders that want full control
    /// over the supported formats.
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// A registry covering the built-in formats: `json`, `yaml`/`yml`,
    /// and `toml`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("json", Box::new(JsonLoader));
        registry.register("yaml", Box::new(YamlLoader));
        registry.register("yml", Box::new(YamlLoader));
        registry.register("toml", Box::new(TomlLoader));
        registry
    }

    /// Register a loader for a file extension (without the dot).
    pub fn register(&mut self, extension: impl Into<String>, loader: Box<dyn FileLoader>) {
        self.loaders.insert(extension.into().to_lowercase(), loader);
    }

    /// Load a file with the loader registered for its extension.
    pub fn load(&self, path: &Path, context: &EvalContext<'_>) -> Result<Value> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let loader = self.loaders.get(&extension).ok_or_else(|| Error::FileEvaluation {
            file: path.display().to_string(),
            message: format!("no loader registered for extension \"{}\"", extension),
        })?;
        loader.load(path, context)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| evaluation_error(path, &err))
}

fn evaluation_error(path: &Path, err: &dyn std::fmt::Display) -> Error {
    Error::FileEvaluation {
        file: path.display().to_string(),
        message: err.to_string(),
    }
}

fn finish(path: &Path, mut value: Value, context: &EvalContext<'_>) -> Result<Value> {
    if !value.is_object() {
        return Err(Error::FileEvaluation {
            file: path.display().to_string(),
            message: "configuration file must evaluate to a mapping".to_string(),
        });
    }
    if let Some(params) = context.params() {
        substitute_params(&mut value, params, path)?;
    }
    Ok(value)
}

/// Replace `${params.*}` references throughout a loaded document.
fn substitute_params(value: &mut Value, params: &Value, path: &Path) -> Result<()> {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                substitute_params(child, params, path)?;
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                substitute_params(child, params, path)?;
            }
        }
        Value::String(text) => {
            if let Some(replacement) = substitute_string(text, params, path)? {
                *value = replacement;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute_string(text: &str, params: &Value, path: &Path) -> Result<Option<Value>> {
    if !text.contains("${") {
        return Ok(None);
    }

    // A string that is exactly one reference keeps the referenced type.
    if let Some(inner) = whole_reference(text) {
        if let Some(resolved) = resolve_reference(inner, params, path)? {
            return Ok(Some(resolved.clone()));
        }
        return Ok(None);
    }

    let mut result = String::new();
    let mut rest = text;
    let mut changed = false;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated token, keep the remainder literal.
            result.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let inner = &after[..end];
        match resolve_reference(inner, params, path)? {
            Some(resolved) => {
                result.push_str(&scalar_text(inner, resolved, path)?);
                changed = true;
            }
            None => result.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    if changed {
        Ok(Some(Value::String(result)))
    } else {
        Ok(None)
    }
}

fn whole_reference(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains("${") || inner.contains('}') {
        return None;
    }
    Some(inner)
}

/// Resolve a reference token. `Ok(None)` means the token is outside the
/// params namespace and should stay literal.
fn resolve_reference<'p>(
    inner: &str,
    params: &'p Value,
    path: &Path,
) -> Result<Option<&'p Value>> {
    let dotted = if inner == "params" {
        ""
    } else if let Some(rest) = inner.strip_prefix("params.") {
        rest
    } else {
        return Ok(None);
    };

    let mut current = params;
    for segment in dotted.split('.').filter(|s| !s.is_empty()) {
        current = current
            .as_object()
            .and_then(|map| map.get(segment))
            .ok_or_else(|| Error::FileEvaluation {
                file: path.display().to_string(),
                message: format!("unknown params reference \"${{{}}}\"", inner),
            })?;
    }
    Ok(Some(current))
}

fn scalar_text(inner: &str, value: &Value, path: &Path) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(Error::FileEvaluation {
            file: path.display().to_string(),
            message: format!(
                "params reference \"${{{}}}\" is not a scalar and cannot be embedded in a string",
                inner
            ),
        }),
    }
}
