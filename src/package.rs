//! The package model consumed from the external dependency manager.
//!
//! A `Package` is read-only input to the core: its pretty name, its
//! declared configuration mapping (group name to file specs), an
//! optional source sub-directory override, and its direct dependency
//! edges. The dependency manager owns installation and path layout; the
//! core only orders packages and reads their declared specs.

use crate::spec::FileSpec;

/// One package as reported by the dependency manager.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    package_type: String,
    config: Vec<(String, Vec<FileSpec>)>,
    source_directory: Option<String>,
    requires: Vec<String>,
    dev_requires: Vec<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, package_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package_type: package_type.into(),
            config: Vec::new(),
            source_directory: None,
            requires: Vec::new(),
            dev_requires: Vec::new(),
        }
    }

    /// Declare a configuration group contributed by this package.
    /// Groups keep their declaration order.
    pub fn with_group(mut self, group: impl Into<String>, specs: Vec<FileSpec>) -> Self {
        self.config.push((group.into(), specs));
        self
    }

    /// Override the sub-directory of the package root holding its
    /// configuration files.
    pub fn with_source_directory(mut self, directory: impl Into<String>) -> Self {
        self.source_directory = Some(directory.into());
        self
    }

    /// Declare direct runtime dependencies by package name.
    pub fn with_requires(mut self, requires: Vec<String>) -> Self {
        self.requires = requires;
        self
    }

    /// Declare direct dev-only dependencies by package name. These are
    /// traversed only when this package is the root of the graph walk.
    pub fn with_dev_requires(mut self, dev_requires: Vec<String>) -> Self {
        self.dev_requires = dev_requires;
        self
    }

    /// Unique package name (e.g. `acme/cache`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package type as declared to the dependency manager.
    pub fn package_type(&self) -> &str {
        &self.package_type
    }

    /// The declared configuration mapping, in declaration order.
    pub fn config(&self) -> &[(String, Vec<FileSpec>)] {
        &self.config
    }

    /// Optional source sub-directory override inside this package.
    pub fn source_directory(&self) -> Option<&str> {
        self.source_directory.as_deref()
    }

    /// Prefix a spec with this package's source sub-directory, yielding
    /// a path relative to the package root.
    pub fn package_relative(&self, spec: &str) -> String {
        match &self.source_directory {
            Some(dir) if !dir.is_empty() => format!("{}/{}", dir, spec),
            _ => spec.to_string(),
        }
    }

    /// Direct runtime dependency names.
    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Direct dev-only dependency names.
    pub fn dev_requires(&self) -> &[String] {
        &self.dev_requires
    }
}
