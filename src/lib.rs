//! # Config Loom
//!
//! This library composes a final, deterministic application
//! configuration from many partial fragments contributed by a root
//! project and an ordered set of dependency packages, across named
//! environments. It is designed to sit behind a package manager
//! integration, but the core is self-contained: give it an ordered
//! package list with declared configuration mappings and a place to
//! persist the merge plan, and it does the rest.
//!
//! ## Quick Example
//!
//! ```
//! use config_loom::plan::{MergePlan, DEFAULT_ENVIRONMENT, ROOT_PACKAGE_NAME};
//! use config_loom::spec::FileSpec;
//!
//! // Build a merge plan incrementally
//! let mut plan = MergePlan::new();
//! plan.add(
//!     DEFAULT_ENVIRONMENT,
//!     "web",
//!     ROOT_PACKAGE_NAME,
//!     FileSpec::path("config/web.json"),
//! );
//!
//! // The default environment is always present
//! assert!(plan.has_environment(DEFAULT_ENVIRONMENT));
//! assert!(plan.has_group(DEFAULT_ENVIRONMENT, "web"));
//!
//! // The plan serializes to a stable JSON artifact
//! let artifact = plan.to_json().unwrap();
//! assert_eq!(plan, MergePlan::from_json(&artifact).unwrap());
//! ```
//!
//! ## Core Concepts
//!
//! - **Packages (`package`, `ordering`)**: read-only descriptions of the
//!   dependency graph. Packages are ordered by their distance from the
//!   root so that the application's own settings always form the last,
//!   highest-precedence layer.
//! - **Merge Plan (`plan`, `builder`, `spec`)**: the persisted
//!   `environment -> group -> package -> [file specs]` artifact
//!   describing which files participate in each group, built once per
//!   dependency-manager run.
//! - **Resolution (`config`, `extractor`, `merger`, `loader`)**: at
//!   runtime the resolver expands a group's plan entries into ordered
//!   `(file, context)` pairs, loads each file through a pluggable
//!   loader, and deep-merges the documents with duplicate-key detection
//!   and precise provenance reporting.
//! - **Modifiers (`modifiers`)**: declarative per-group policies that
//!   switch on recursive merging, invert precedence, or strip vendor
//!   contributions.
//!
//! ## Execution Flow
//!
//! 1. **Order**: sort packages by dependency depth, deepest first.
//! 2. **Plan**: walk the ordered packages' declared groups, then layer
//!    the root package's configuration and the named environments;
//!    persist the result as a stable artifact.
//! 3. **Resolve**: per requested group, extract the ordered file list
//!    (expanding wildcards against the live filesystem), build the
//!    params group first, merge everything, and cache the result for
//!    the lifetime of the resolver.

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod merger;
pub mod modifiers;
pub mod options;
pub mod ordering;
pub mod package;
pub mod paths;
pub mod plan;
pub mod spec;

#[cfg(test)]
mod merge_proptest;
