//! Options declared by the embedding application.
//!
//! These mirror what the external dependency manager passes alongside
//! the package list: where configuration lives, which package types
//! participate in the graph, which packages form the vendor-override
//! layer, and how the merge plan artifact is named.

use crate::plan::DEFAULT_MERGE_PLAN_FILE;

/// Default name of the reserved params group.
pub const DEFAULT_PARAMS_GROUP: &str = "params";

/// Options controlling plan building and resolution.
#[derive(Debug, Clone)]
pub struct Options {
    /// Whether a merge plan should be built at all.
    pub build_merge_plan: bool,
    /// File name of the persisted merge plan artifact, relative to the
    /// configuration source directory.
    pub merge_plan_file: String,
    /// Sub-directory of the project root holding the root package's own
    /// configuration files.
    pub source_directory: String,
    /// Sub-directory of the project root where dependency packages are
    /// installed.
    pub vendor_directory: String,
    /// Package name patterns forming the vendor-override layer. `*`
    /// wildcards are allowed.
    pub vendor_override_packages: Vec<String>,
    /// Package types included in the dependency graph walk. Packages of
    /// any other type are silently ignored, even when depended upon.
    pub package_types: Vec<String>,
    /// Name of the reserved params group, built before any other group
    /// so that regular files can reference its values. `None` disables
    /// the params pass entirely.
    pub params_group: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            build_merge_plan: true,
            merge_plan_file: DEFAULT_MERGE_PLAN_FILE.to_string(),
            source_directory: "config".to_string(),
            vendor_directory: "vendor".to_string(),
            vendor_override_packages: Vec::new(),
            package_types: vec!["library".to_string()],
            params_group: Some(DEFAULT_PARAMS_GROUP.to_string()),
        }
    }
}

impl Options {
    /// Whether the given package type participates in the dependency
    /// graph walk.
    pub fn is_accepted_type(&self, package_type: &str) -> bool {
        self.package_types.iter().any(|t| t == package_type)
    }
}
