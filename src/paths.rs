//! Filesystem path resolution rules.
//!
//! Maps a package plus a relative file spec to an absolute path, and maps
//! absolute paths back to root-relative "provenance" paths for error
//! messages. Root-package entries resolve under the project root (the
//! plan builder already prefixes them with the source directory), vendor
//! entries resolve under that package's install directory.

use std::path::{Path, PathBuf};

use crate::plan::ROOT_PACKAGE_NAME;

/// Path resolution rules for one project.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    root: PathBuf,
    source_directory: String,
    vendor_directory: String,
}

impl ConfigPaths {
    pub fn new(
        root: impl Into<PathBuf>,
        source_directory: impl Into<String>,
        vendor_directory: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            source_directory: source_directory.into(),
            vendor_directory: vendor_directory.into(),
        }
    }

    /// The project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration source sub-directory name.
    pub fn source_directory(&self) -> &str {
        &self.source_directory
    }

    /// Absolute path of the configuration source directory.
    pub fn source_path(&self) -> PathBuf {
        if self.source_directory.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.source_directory)
        }
    }

    /// Prefix a root-package spec with the source directory.
    ///
    /// The plan builder calls this when rewriting the root package's
    /// plain specs, so that plan entries for the root resolve directly
    /// against the project root.
    pub fn source_spec(&self, spec: &str) -> String {
        if self.source_directory.is_empty() {
            spec.to_string()
        } else {
            format!("{}/{}", self.source_directory, spec)
        }
    }

    /// Absolute install directory of a dependency package.
    pub fn package_root(&self, package: &str) -> PathBuf {
        self.root.join(&self.vendor_directory).join(package)
    }

    /// Resolve a plan entry to an absolute path.
    ///
    /// Root-package entries already carry the source-directory prefix
    /// and resolve against the project root; vendor entries resolve
    /// under the package's install directory.
    pub fn absolute(&self, package: &str, spec: &str) -> PathBuf {
        if package == ROOT_PACKAGE_NAME {
            self.root.join(spec)
        } else {
            self.package_root(package).join(spec)
        }
    }

    /// Absolute path of the merge plan artifact.
    pub fn plan_path(&self, file_name: &str) -> PathBuf {
        self.source_path().join(file_name)
    }

    /// Root-relative provenance path for error messages.
    ///
    /// Paths outside the project root are displayed as-is.
    pub fn relative(&self, path: &Path) -> String {
        let display = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string();
        // Provenance paths must compare equal across platforms.
        display.replace('\\', "/")
    }
}
