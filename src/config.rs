//! The configuration resolver façade.
//!
//! `Config` ties the pieces together: it loads the persisted merge plan,
//! validates the requested environment, and builds configuration groups
//! on demand. Construction fails fast — an unknown environment is
//! rejected before any group is touched — and a constructed resolver
//! moves through each `get()` call as a single blocking computation.
//!
//! ## Building a group
//!
//! 1. A cached value is returned immediately; the cache is per resolver
//!    instance and never invalidated, so a resolver deliberately does
//!    not observe file changes made after construction.
//! 2. If a params group is configured, it is built before anything
//!    else. Files evaluated during that pass get no params snapshot,
//!    which keeps the params group from referencing itself.
//! 3. The group's entries are extracted in merge order and folded into
//!    an accumulator with a fresh duplicate-key table. `$group` entries
//!    resolve to the referenced group's fully built value; a group
//!    referencing itself is rejected, and a reference chain that
//!    revisits a group already being built aborts with a circular
//!    reference error.
//!
//! All failures abort the current `get()` call entirely; none are
//! caught internally and no partial configuration is ever returned.

use std::collections::HashMap;

use glob::Pattern;
use log::debug;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::extractor::FilesExtractor;
use crate::loader::{EvalContext, LoaderRegistry};
use crate::merger::Merger;
use crate::modifiers::Modifiers;
use crate::options::Options;
use crate::paths::ConfigPaths;
use crate::plan::{MergePlan, DEFAULT_ENVIRONMENT};
use crate::spec;

/// Layered configuration resolver.
#[derive(Debug)]
pub struct Config {
    paths: ConfigPaths,
    environment: String,
    plan: MergePlan,
    modifiers: Modifiers,
    vendor_override: Vec<Pattern>,
    loaders: LoaderRegistry,
    params_group: Option<String>,
    built: HashMap<String, Value>,
    building: Vec<String>,
    building_params: bool,
}

impl Config {
    /// Load the merge plan artifact and construct a resolver for the
    /// given environment.
    ///
    /// # Errors
    ///
    /// - `Error::Plan` when the artifact cannot be read or parsed.
    /// - `Error::EnvironmentNotFound` when the environment is absent
    ///   from the plan.
    pub fn new(
        paths: ConfigPaths,
        environment: &str,
        modifiers: Modifiers,
        options: &Options,
    ) -> Result<Self> {
        let plan = MergePlan::load_from(&paths.plan_path(&options.merge_plan_file))?;
        Self::from_plan(plan, paths, environment, modifiers, options)
    }

    /// Construct a resolver from an already loaded plan.
    pub fn from_plan(
        plan: MergePlan,
        paths: ConfigPaths,
        environment: &str,
        modifiers: Modifiers,
        options: &Options,
    ) -> Result<Self> {
        if !plan.has_environment(environment) {
            return Err(Error::EnvironmentNotFound {
                environment: environment.to_string(),
            });
        }
        let mut vendor_override = Vec::with_capacity(options.vendor_override_packages.len());
        for pattern in &options.vendor_override_packages {
            vendor_override.push(Pattern::new(pattern)?);
        }
        Ok(Self {
            paths,
            environment: environment.to_string(),
            plan,
            modifiers,
            vendor_override,
            loaders: LoaderRegistry::with_defaults(),
            params_group: options.params_group.clone(),
            built: HashMap::new(),
            building: Vec::new(),
            building_params: false,
        })
    }

    /// Replace the loader registry, e.g. to add formats or to
    /// instrument file access in tests.
    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    /// The active environment name.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The path resolution rules in use.
    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Whether the group is declared for the active or the default
    /// environment.
    pub fn has(&self, group: &str) -> bool {
        self.plan.has_group(&self.environment, group)
            || self.plan.has_group(DEFAULT_ENVIRONMENT, group)
    }

    /// Build (or fetch from cache) the fully merged value of a group.
    ///
    /// # Errors
    ///
    /// Any of the resolution errors: `GroupNotFound`, `FileNotFound`,
    /// `InvalidVariable`, `CircularReference`, `DuplicateKey`, and
    /// `FileEvaluation`.
    pub fn get(&mut self, group: &str) -> Result<Value> {
        if let Some(value) = self.built.get(group) {
            return Ok(value.clone());
        }
        self.prime_params(group)?;
        self.build_group(group)
    }

    /// Build the configured params group before a regular group, so its
    /// values can be referenced from the files about to be evaluated.
    fn prime_params(&mut self, requested: &str) -> Result<()> {
        let Some(params_group) = self.params_group.clone() else {
            return Ok(());
        };
        if params_group == requested || self.built.contains_key(&params_group) {
            return Ok(());
        }
        if !self.has(&params_group) {
            return Ok(());
        }
        self.build_group(&params_group)?;
        Ok(())
    }

    fn build_group(&mut self, group: &str) -> Result<Value> {
        if let Some(value) = self.built.get(group) {
            return Ok(value.clone());
        }

        if self.building.iter().any(|name| name == group) {
            let mut chain: Vec<&str> = self.building.iter().map(String::as_str).collect();
            chain.push(group);
            return Err(Error::CircularReference {
                chain: chain.join(" -> "),
            });
        }

        self.building.push(group.to_string());
        let params_pass = self.params_group.as_deref() == Some(group);
        if params_pass {
            self.building_params = true;
        }

        let result = self.build_group_documents(group);

        if params_pass {
            self.building_params = false;
        }
        self.building.pop();

        let value = result?;
        self.built.insert(group.to_string(), value.clone());
        debug!("built group \"{}\"", group);
        Ok(value)
    }

    fn build_group_documents(&mut self, group: &str) -> Result<Value> {
        let entries = FilesExtractor::new(
            &self.paths,
            &self.modifiers,
            &self.vendor_override,
            &self.environment,
        )
        .extract(&self.plan, group)?;

        // Chase variable references first; the merge loop below only
        // borrows the resolver immutably.
        let mut documents: Vec<(std::path::PathBuf, Context, Option<Value>)> =
            Vec::with_capacity(entries.len());
        for (path, context) in entries {
            let resolved = if context.is_variable() {
                let token = path.to_string_lossy().into_owned();
                let name = spec::variable_name(&token).unwrap_or_default().to_string();
                if name == group {
                    return Err(Error::InvalidVariable {
                        message: format!(
                            "\"${}\" cannot reference the group it is declared in",
                            name
                        ),
                    });
                }
                Some(self.build_group(&name)?)
            } else {
                None
            };
            documents.push((path, context, resolved));
        }

        let mut merger = Merger::new(&self.modifiers, &self.paths);
        let mut accumulator = Value::Object(Map::new());
        for (path, context, resolved) in documents {
            let document = match resolved {
                Some(value) => value,
                None => {
                    let params = if self.building_params {
                        None
                    } else {
                        self.params_snapshot()
                    };
                    let eval = match params {
                        Some(params) => EvalContext::with_params(params),
                        None => EvalContext::new(),
                    };
                    self.loaders.load(&path, &eval)?
                }
            };
            accumulator = merger.merge(&context, accumulator, document)?;
        }
        Ok(accumulator)
    }

    fn params_snapshot(&self) -> Option<&Value> {
        self.params_group
            .as_deref()
            .and_then(|group| self.built.get(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::Modifier;
    use crate::plan::ROOT_PACKAGE_NAME;
    use crate::spec::FileSpec;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: ConfigPaths,
        plan: MergePlan,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = ConfigPaths::new(dir.path(), "config", "vendor");
            Self {
                _dir: dir,
                paths,
                plan: MergePlan::new(),
            }
        }

        fn write(&self, relative: &str, content: &str) {
            let path = self.paths.root().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn config(&self, environment: &str) -> Result<Config> {
            self.config_with(environment, vec![], &Options::default())
        }

        fn config_with(
            &self,
            environment: &str,
            declarations: Vec<Modifier>,
            options: &Options,
        ) -> Result<Config> {
            Config::from_plan(
                self.plan.clone(),
                self.paths.clone(),
                environment,
                Modifiers::new(declarations).unwrap(),
                options,
            )
        }
    }

    #[test]
    fn test_unknown_environment_rejected_at_construction() {
        let fixture = Fixture::new();
        let err = fixture.config("prod").unwrap_err();
        match err {
            Error::EnvironmentNotFound { environment } => assert_eq!(environment, "prod"),
            other => panic!("expected EnvironmentNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_application_extends_and_overrides_vendor() {
        let mut fixture = Fixture::new();
        fixture.write("vendor/acme/cache/params.json", r#"{"b": 2}"#);
        fixture.write("config/params.json", r#"{"a": 1}"#);
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "params",
            "acme/cache",
            FileSpec::path("params.json"),
        );
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "params",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/params.json"),
        );

        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        assert_eq!(config.get("params").unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_missing_group_is_fatal() {
        let fixture = Fixture::new();
        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        let err = config.get("ghost").unwrap_err();
        assert!(matches!(err, Error::GroupNotFound { .. }));
    }

    #[test]
    fn test_environment_overlay_overrides_application() {
        let mut fixture = Fixture::new();
        fixture.write("config/web.json", r#"{"debug": false}"#);
        fixture.write("config/web-dev.json", r#"{"debug": true}"#);
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/web.json"),
        );
        fixture.plan.add(
            "dev",
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/web-dev.json"),
        );

        let mut config = fixture.config("dev").unwrap();
        assert_eq!(config.get("web").unwrap(), json!({"debug": true}));

        // The default environment never sees the overlay.
        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        assert_eq!(config.get("web").unwrap(), json!({"debug": false}));
    }

    #[test]
    fn test_group_falls_back_to_default_environment() {
        let mut fixture = Fixture::new();
        fixture.write("config/web.json", r#"{"debug": false}"#);
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/web.json"),
        );
        fixture.plan.add_environment_without_configs("dev");

        let mut config = fixture.config("dev").unwrap();
        assert_eq!(config.get("web").unwrap(), json!({"debug": false}));
    }

    #[test]
    fn test_variable_resolves_to_referenced_group() {
        let mut fixture = Fixture::new();
        fixture.write("config/params.json", r#"{"a": 1}"#);
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "params",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/params.json"),
        );
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "params-web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("$params"),
        );

        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        assert_eq!(config.get("params-web").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut fixture = Fixture::new();
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("$web"),
        );

        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        let err = config.get("web").unwrap_err();
        assert!(matches!(err, Error::InvalidVariable { .. }));
    }

    #[test]
    fn test_circular_reference_detected() {
        let mut fixture = Fixture::new();
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "alpha",
            ROOT_PACKAGE_NAME,
            FileSpec::path("$beta"),
        );
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "beta",
            ROOT_PACKAGE_NAME,
            FileSpec::path("$alpha"),
        );

        let options = Options {
            params_group: None,
            ..Options::default()
        };
        let mut config = fixture
            .config_with(DEFAULT_ENVIRONMENT, vec![], &options)
            .unwrap();
        let err = config.get("alpha").unwrap_err();
        match err {
            Error::CircularReference { chain } => {
                assert_eq!(chain, "alpha -> beta -> alpha");
            }
            other => panic!("expected CircularReference, got {other:?}"),
        }
    }

    #[test]
    fn test_params_available_to_regular_groups() {
        let mut fixture = Fixture::new();
        fixture.write("config/params.json", r#"{"app": {"port": 8080}}"#);
        fixture.write(
            "config/web.json",
            r#"{"port": "${params.app.port}"}"#,
        );
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "params",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/params.json"),
        );
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/web.json"),
        );

        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        assert_eq!(config.get("web").unwrap(), json!({"port": 8080}));
    }

    #[test]
    fn test_params_files_do_not_see_params() {
        let mut fixture = Fixture::new();
        fixture.write(
            "config/params.json",
            r#"{"self": "${params.self}"}"#,
        );
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "params",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/params.json"),
        );

        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        // The token survives untouched instead of self-referencing.
        assert_eq!(
            config.get("params").unwrap(),
            json!({"self": "${params.self}"})
        );
    }

    #[test]
    fn test_get_is_idempotent_and_cached() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct CountingLoader {
            inner: crate::loader::JsonLoader,
            count: Rc<Cell<usize>>,
        }
        impl crate::loader::FileLoader for CountingLoader {
            fn load(&self, path: &Path, context: &EvalContext<'_>) -> Result<Value> {
                self.count.set(self.count.get() + 1);
                self.inner.load(path, context)
            }
        }

        let mut fixture = Fixture::new();
        fixture.write("config/web.json", r#"{"a": 1}"#);
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/web.json"),
        );

        let count = Rc::new(Cell::new(0));
        let mut loaders = LoaderRegistry::new();
        loaders.register(
            "json",
            Box::new(CountingLoader {
                inner: crate::loader::JsonLoader,
                count: Rc::clone(&count),
            }),
        );
        let mut config = fixture
            .config(DEFAULT_ENVIRONMENT)
            .unwrap()
            .with_loaders(loaders);

        let first = config.get("web").unwrap();
        let loads_after_first = count.get();
        let second = config.get("web").unwrap();

        assert_eq!(first, second);
        assert_eq!(count.get(), loads_after_first);
    }

    #[test]
    fn test_file_evaluation_error_propagates() {
        let mut fixture = Fixture::new();
        fixture.write("config/web.json", "{broken");
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/web.json"),
        );

        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        let err = config.get("web").unwrap_err();
        assert!(matches!(err, Error::FileEvaluation { .. }));
    }

    #[test]
    fn test_duplicate_key_state_scoped_per_group_build() {
        let mut fixture = Fixture::new();
        fixture.write("config/web.json", r#"{"x": 1}"#);
        fixture.write("config/console.json", r#"{"x": 2}"#);
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/web.json"),
        );
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "console",
            ROOT_PACKAGE_NAME,
            FileSpec::path("config/console.json"),
        );

        // Both groups write "x" at the application layer; that must not
        // collide across separate builds.
        let mut config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        assert_eq!(config.get("web").unwrap(), json!({"x": 1}));
        assert_eq!(config.get("console").unwrap(), json!({"x": 2}));
    }

    #[test]
    fn test_has_group() {
        let mut fixture = Fixture::new();
        fixture.plan.add(
            DEFAULT_ENVIRONMENT,
            "web",
            ROOT_PACKAGE_NAME,
            FileSpec::path("?config/web.json"),
        );
        fixture.plan.add("dev", "dev-only", ROOT_PACKAGE_NAME, FileSpec::path("?x.json"));

        let config = fixture.config(DEFAULT_ENVIRONMENT).unwrap();
        assert!(config.has("web"));
        assert!(!config.has("dev-only"));

        let config = fixture.config("dev").unwrap();
        assert!(config.has("web"));
        assert!(config.has("dev-only"));
    }
}
