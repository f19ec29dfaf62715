//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for
//! `config-loom`. It uses the `thiserror` library to create a single
//! `Error` enum that covers all anticipated failure modes, providing
//! clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that
//!   can occur while building a merge plan or resolving a configuration
//!   group. Each variant corresponds to a specific failure mode and
//!   includes contextual information to aid in debugging.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`,
//!   used throughout the crate to simplify function signatures.
//!
//! Every variant is fatal: nothing is retried and nothing is swallowed.
//! A failure aborts the current plan build or `get()` call entirely, so
//! the caller never observes a partially merged configuration.

use thiserror::Error;

/// Main error type for config-loom operations
#[derive(Error, Debug)]
pub enum Error {
    /// The requested environment does not exist in the merge plan.
    #[error("The \"{environment}\" configuration environment does not exist")]
    EnvironmentNotFound { environment: String },

    /// The requested (or variable-referenced) group is absent from the
    /// merge plan for both the active and the default environment.
    #[error("The \"{group}\" configuration group does not exist")]
    GroupNotFound { group: String },

    /// A non-optional file spec resolved to zero existing files.
    #[error("The \"{path}\" configuration file does not exist")]
    FileNotFound { path: String },

    /// A `$variable` spec appeared where it is not allowed, for example
    /// inside an environment override or as a reference to the group
    /// that is currently being built.
    #[error("Invalid variable usage: {message}")]
    InvalidVariable { message: String },

    /// A chain of `$group` indirections revisited a group that is
    /// already being built.
    #[error("Circular variable reference detected: {chain}")]
    CircularReference { chain: String },

    /// Two contributors at the same merge tier wrote the same key path.
    ///
    /// The message lists the full dotted key path and every contributing
    /// file path relative to the configuration root, shallowest paths
    /// first.
    #[error("Duplicate key \"{key_path}\" in the following configuration files:{}", files.iter().map(|f| format!("\n - {}", f)).collect::<String>())]
    DuplicateKey {
        key_path: String,
        files: Vec<String>,
    },

    /// An error surfaced while loading and evaluating a configuration
    /// file. Parse errors, unreadable files, and unsupported formats all
    /// escalate to this kind so that a buggy configuration file cannot
    /// silently corrupt the result.
    #[error("Failed to evaluate configuration file \"{file}\": {message}")]
    FileEvaluation { file: String, message: String },

    /// The merge plan artifact could not be serialized, deserialized, or
    /// did not have the expected shape.
    #[error("Merge plan error: {message}")]
    Plan { message: String },

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
