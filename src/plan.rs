//! The merge plan: which files, per package and group, participate in
//! building each environment's configuration.
//!
//! The plan is a nested mapping `environment -> group -> package ->
//! [file specs]`. It is built once per dependency-manager run, persisted
//! as a JSON artifact, and loaded read-only by the resolver.
//!
//! ## Invariants
//!
//! - The default environment key is always present, even in an otherwise
//!   empty plan.
//! - Within a group, packages keep their insertion order: the order the
//!   plan builder appended them is the order the resolver merges them.
//! - Serialization is deterministic: environments and groups are stored
//!   in sorted maps, so the same logical input always produces the same
//!   artifact bytes. `save_to` additionally compares content with line
//!   endings normalized and skips the write when nothing changed, to
//!   avoid spurious rebuild churn for tooling that watches the file.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::spec::FileSpec;

/// Reserved package identifier for the root project.
pub const ROOT_PACKAGE_NAME: &str = "/";

/// Reserved environment name meaning "default / no environment".
pub const DEFAULT_ENVIRONMENT: &str = "/";

/// Default file name of the persisted merge plan artifact.
pub const DEFAULT_MERGE_PLAN_FILE: &str = ".merge-plan.json";

/// File specs contributed to one group, keyed by package in insertion
/// order.
///
/// Serialized as a JSON mapping whose key order is the package
/// application order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPlan {
    packages: Vec<(String, Vec<FileSpec>)>,
}

impl GroupPlan {
    /// Iterate packages in application order.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &[FileSpec])> {
        self.packages
            .iter()
            .map(|(name, specs)| (name.as_str(), specs.as_slice()))
    }

    /// Whether no package contributes to this group.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn specs_mut(&mut self, package: &str) -> &mut Vec<FileSpec> {
        if let Some(index) = self.packages.iter().position(|(name, _)| name == package) {
            return &mut self.packages[index].1;
        }
        self.packages.push((package.to_string(), Vec::new()));
        let last = self.packages.len() - 1;
        &mut self.packages[last].1
    }
}

impl Serialize for GroupPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.packages.len()))?;
        for (package, specs) in &self.packages {
            map.serialize_entry(package, specs)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GroupPlan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct GroupPlanVisitor;

        impl<'de> Visitor<'de> for GroupPlanVisitor {
            type Value = GroupPlan;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping of package names to file spec lists")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut packages = Vec::new();
                while let Some((package, specs)) =
                    access.next_entry::<String, Vec<FileSpec>>()?
                {
                    packages.push((package, specs));
                }
                Ok(GroupPlan { packages })
            }
        }

        deserializer.deserialize_map(GroupPlanVisitor)
    }
}

/// Groups declared for one environment, in sorted order.
pub type EnvironmentPlan = BTreeMap<String, GroupPlan>;

/// The complete merge plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergePlan {
    environments: BTreeMap<String, EnvironmentPlan>,
}

impl Default for MergePlan {
    fn default() -> Self {
        Self::new()
    }
}

impl MergePlan {
    /// Create an empty plan containing only the default environment.
    pub fn new() -> Self {
        let mut environments = BTreeMap::new();
        environments.insert(DEFAULT_ENVIRONMENT.to_string(), EnvironmentPlan::new());
        Self { environments }
    }

    /// Append one file spec to a group's package entry.
    pub fn add(&mut self, environment: &str, group: &str, package: &str, spec: FileSpec) {
        self.group_mut(environment, group)
            .specs_mut(package)
            .push(spec);
    }

    /// Append several file specs to a group's package entry at once.
    pub fn add_multiple(
        &mut self,
        environment: &str,
        group: &str,
        package: &str,
        specs: Vec<FileSpec>,
    ) {
        self.group_mut(environment, group)
            .specs_mut(package)
            .extend(specs);
    }

    /// Record a group with no contributions yet.
    pub fn add_group(&mut self, environment: &str, group: &str) {
        self.group_mut(environment, group);
    }

    /// Record an environment that declares no groups at all.
    ///
    /// The environment becomes visible to `has_environment` while
    /// `has_group` stays false for every group in it.
    pub fn add_environment_without_configs(&mut self, environment: &str) {
        self.environments
            .entry(environment.to_string())
            .or_default();
    }

    /// Whether the environment is present in the plan.
    pub fn has_environment(&self, environment: &str) -> bool {
        self.environments.contains_key(environment)
    }

    /// Whether the group is declared in the given environment.
    pub fn has_group(&self, environment: &str, group: &str) -> bool {
        self.environments
            .get(environment)
            .map(|groups| groups.contains_key(group))
            .unwrap_or(false)
    }

    /// The group's plan in the given environment, if declared.
    pub fn group(&self, environment: &str, group: &str) -> Option<&GroupPlan> {
        self.environments.get(environment)?.get(group)
    }

    /// All environment names, sorted.
    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(|name| name.as_str())
    }

    /// All group names declared in the given environment, sorted.
    pub fn groups(&self, environment: &str) -> impl Iterator<Item = &str> {
        self.environments
            .get(environment)
            .into_iter()
            .flat_map(|groups| groups.keys().map(|name| name.as_str()))
    }

    fn group_mut(&mut self, environment: &str, group: &str) -> &mut GroupPlan {
        self.environments
            .entry(environment.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
    }

    /// Serialize the plan to its canonical JSON artifact form.
    pub fn to_json(&self) -> Result<String> {
        let mut content = serde_json::to_string_pretty(self).map_err(|err| Error::Plan {
            message: format!("failed to serialize merge plan: {}", err),
        })?;
        content.push('\n');
        Ok(content)
    }

    /// Parse a plan from its JSON artifact form.
    ///
    /// The default-environment invariant is restored for artifacts
    /// produced by older tooling that omitted the empty default key.
    pub fn from_json(content: &str) -> Result<Self> {
        let mut plan: MergePlan = serde_json::from_str(content).map_err(|err| Error::Plan {
            message: format!("failed to parse merge plan: {}", err),
        })?;
        plan.environments
            .entry(DEFAULT_ENVIRONMENT.to_string())
            .or_default();
        Ok(plan)
    }

    /// Load a plan artifact from disk.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| Error::Plan {
            message: format!("failed to read merge plan \"{}\": {}", path.display(), err),
        })?;
        Self::from_json(&content)
    }

    /// Write the plan artifact, unless an existing artifact already has
    /// the same content modulo line endings. Returns whether the file
    /// was (re)written.
    pub fn save_to(&self, path: &Path) -> Result<bool> {
        let content = self.to_json()?;

        if path.exists() {
            let existing = fs::read_to_string(path)?;
            if normalize_line_endings(&existing) == normalize_line_endings(&content) {
                debug!("merge plan unchanged, skipping write: {}", path.display());
                return Ok(false);
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        debug!("merge plan written: {}", path.display());
        Ok(true)
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
