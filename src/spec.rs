//! File spec tokens and their parsing rules.
//!
//! A merge plan entry is a small string token describing one
//! configuration contribution:
//!
//! - a plain relative path (`"params.json"`)
//! - an optional-marker prefix `?` — the file may be missing and is then
//!   silently skipped
//! - a variable reference prefix `$` — the entry stands for another
//!   group's fully resolved value instead of a file
//! - a wildcard (`*` anywhere in the path) — expanded via glob against
//!   the filesystem
//!
//! An entry can additionally be scoped to a single environment, in which
//! case it is stored as an `(environment, spec)` pair and only
//! participates when that environment is active. The helpers here are
//! shared by the plan builder (build-time normalization) and the group
//! file extractor (resolve-time interpretation).

use serde::{Deserialize, Serialize};

/// Marker prefix for files that are allowed to be missing.
pub const OPTIONAL_MARKER: char = '?';

/// Marker prefix for group variable references.
pub const VARIABLE_MARKER: char = '$';

/// One merge plan entry: either a spec string or an environment-scoped
/// `(environment, spec)` pair.
///
/// Serializes untagged, so a plain entry round-trips as a JSON string
/// and a scoped entry as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileSpec {
    /// A plain spec token.
    Path(String),
    /// A spec token that only applies when the named environment is the
    /// active one.
    EnvScoped(String, String),
}

impl FileSpec {
    /// Create a plain entry from any string-ish spec.
    pub fn path(spec: impl Into<String>) -> Self {
        FileSpec::Path(spec.into())
    }

    /// Create an environment-scoped entry.
    pub fn env_scoped(environment: impl Into<String>, spec: impl Into<String>) -> Self {
        FileSpec::EnvScoped(environment.into(), spec.into())
    }

    /// The spec token, regardless of environment scoping.
    pub fn spec(&self) -> &str {
        match self {
            FileSpec::Path(spec) => spec,
            FileSpec::EnvScoped(_, spec) => spec,
        }
    }

    /// The environment this entry is scoped to, if any.
    pub fn environment(&self) -> Option<&str> {
        match self {
            FileSpec::Path(_) => None,
            FileSpec::EnvScoped(environment, _) => Some(environment),
        }
    }
}

/// Whether a spec token carries the `?` optional marker.
pub fn is_optional(spec: &str) -> bool {
    spec.starts_with(OPTIONAL_MARKER)
}

/// Strip the `?` optional marker, if present.
pub fn strip_optional(spec: &str) -> &str {
    spec.strip_prefix(OPTIONAL_MARKER).unwrap_or(spec)
}

/// Whether a spec token is a `$group` variable reference.
///
/// The optional marker must already be stripped; `?$group` is not a
/// meaningful combination and is treated as a plain path.
pub fn is_variable(spec: &str) -> bool {
    spec.starts_with(VARIABLE_MARKER) && spec.len() > 1
}

/// The group name referenced by a `$group` token.
pub fn variable_name(spec: &str) -> Option<&str> {
    if is_variable(spec) {
        spec.strip_prefix(VARIABLE_MARKER)
    } else {
        None
    }
}

/// Whether a spec token contains a glob wildcard.
pub fn is_wildcard(spec: &str) -> bool {
    spec.contains('*')
}
