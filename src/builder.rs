//! Building the merge plan from an ordered package list.
//!
//! The builder walks the ordered packages and their declared
//! configuration groups, normalizing every file spec into a plan entry:
//!
//! - `$group` variable references are stored verbatim; variables are
//!   never expanded at plan-build time.
//! - Wildcard specs are glob-expanded against the package directory now;
//!   each match is recorded relative to the package root, and an empty
//!   expansion is simply skipped.
//! - Optional files that do not exist are skipped entirely; existing
//!   optional files keep their `?` marker so that the resolver tolerates
//!   their later disappearance.
//! - Plain non-optional specs are recorded whether or not the file
//!   currently exists; a missing file only becomes an error at resolve
//!   time.
//!
//! After all packages, the root package's own configuration is layered
//! under the reserved root identifier with its specs rewritten relative
//! to the source directory (wildcards stay unexpanded and are matched
//! against the live filesystem at resolve time). Finally, named
//! environments are layered: an environment declaring no groups is
//! recorded as present-but-empty, and a duplicated default-environment
//! key is skipped.
//!
//! The builder itself never fails for graph shape; only filesystem
//! errors propagate.

use std::path::Path;

use log::{debug, warn};

use crate::error::Result;
use crate::options::Options;
use crate::ordering::order_packages;
use crate::package::Package;
use crate::paths::ConfigPaths;
use crate::plan::{MergePlan, DEFAULT_ENVIRONMENT, ROOT_PACKAGE_NAME};
use crate::spec::{self, FileSpec};

/// Group lists declared for named environments:
/// `(environment, [(group, specs)])`.
pub type EnvironmentsConfig = Vec<(String, Vec<(String, Vec<FileSpec>)>)>;

/// Incremental merge plan builder.
pub struct MergePlanBuilder<'a> {
    paths: &'a ConfigPaths,
    plan: MergePlan,
}

impl<'a> MergePlanBuilder<'a> {
    pub fn new(paths: &'a ConfigPaths) -> Self {
        Self {
            paths,
            plan: MergePlan::new(),
        }
    }

    /// Record one dependency package's declared configuration.
    pub fn add_package(&mut self, package: &Package) -> Result<()> {
        let package_root = self.paths.package_root(package.name());

        for (group, specs) in package.config() {
            for file_spec in specs {
                match file_spec {
                    FileSpec::Path(token) => {
                        for entry in self.package_entries(package, &package_root, token)? {
                            self.plan
                                .add(DEFAULT_ENVIRONMENT, group, package.name(), entry);
                        }
                    }
                    FileSpec::EnvScoped(environment, token) => {
                        // Environment-scoped entries stay conditional;
                        // existence is only checked once they activate.
                        let rewritten = rewrite_token(token, |body| package.package_relative(body));
                        self.plan.add(
                            DEFAULT_ENVIRONMENT,
                            group,
                            package.name(),
                            FileSpec::env_scoped(environment.clone(), rewritten),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Record the root package's own configuration under the reserved
    /// root identifier, preserving `?` and `$` syntax.
    pub fn add_root_config(&mut self, config: &[(String, Vec<FileSpec>)]) {
        for (group, specs) in config {
            for file_spec in specs {
                let entry = self.rewrite_root_spec(file_spec);
                self.plan
                    .add(DEFAULT_ENVIRONMENT, group, ROOT_PACKAGE_NAME, entry);
            }
        }
    }

    /// Layer named environments over the plan.
    pub fn add_environments(&mut self, environments: &EnvironmentsConfig) {
        for (environment, groups) in environments {
            if environment == DEFAULT_ENVIRONMENT {
                debug!("skipping duplicated default environment key");
                continue;
            }
            if groups.is_empty() {
                self.plan.add_environment_without_configs(environment);
                continue;
            }
            for (group, specs) in groups {
                for file_spec in specs {
                    let entry = self.rewrite_root_spec(file_spec);
                    self.plan.add(environment, group, ROOT_PACKAGE_NAME, entry);
                }
            }
        }
    }

    /// Finish and return the plan.
    pub fn into_plan(self) -> MergePlan {
        self.plan
    }

    /// Normalize one plain package token into zero or more plan entries.
    fn package_entries(
        &self,
        package: &Package,
        package_root: &Path,
        token: &str,
    ) -> Result<Vec<FileSpec>> {
        let optional = spec::is_optional(token);
        let body = spec::strip_optional(token);

        if spec::is_variable(body) {
            return Ok(vec![FileSpec::path(token)]);
        }

        let relative = package.package_relative(body);

        if spec::is_wildcard(&relative) {
            let pattern = package_root.join(&relative);
            let matches = glob::glob(&pattern.to_string_lossy())?
                .filter_map(std::result::Result::ok)
                .filter(|path| path.is_file())
                .filter_map(|path| {
                    path.strip_prefix(package_root)
                        .ok()
                        .map(|rel| FileSpec::path(unix_path(rel)))
                })
                .collect::<Vec<_>>();
            if matches.is_empty() {
                warn!(
                    "wildcard \"{}\" matched nothing in {}",
                    relative,
                    package.name()
                );
            }
            return Ok(matches);
        }

        if optional && !package_root.join(&relative).exists() {
            warn!("optional \"{}\" missing in {}", relative, package.name());
            return Ok(Vec::new());
        }

        let token = if optional {
            format!("{}{}", spec::OPTIONAL_MARKER, relative)
        } else {
            relative
        };
        Ok(vec![FileSpec::path(token)])
    }

    fn rewrite_root_spec(&self, file_spec: &FileSpec) -> FileSpec {
        match file_spec {
            FileSpec::Path(token) => {
                FileSpec::path(rewrite_token(token, |body| self.paths.source_spec(body)))
            }
            FileSpec::EnvScoped(environment, token) => FileSpec::env_scoped(
                environment.clone(),
                rewrite_token(token, |body| self.paths.source_spec(body)),
            ),
        }
    }
}

/// Rewrite a spec token's path part, keeping `?` and `$` markers intact.
fn rewrite_token(token: &str, rewrite: impl Fn(&str) -> String) -> String {
    let optional = spec::is_optional(token);
    let body = spec::strip_optional(token);
    if spec::is_variable(body) {
        return token.to_string();
    }
    let rewritten = rewrite(body);
    if optional {
        format!("{}{}", spec::OPTIONAL_MARKER, rewritten)
    } else {
        rewritten
    }
}

fn unix_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Build a complete merge plan: order the packages, walk their declared
/// configs, then layer the root package's config and the named
/// environments.
pub fn build_merge_plan(
    paths: &ConfigPaths,
    options: &Options,
    root: &Package,
    packages: &[Package],
    environments: &EnvironmentsConfig,
) -> Result<MergePlan> {
    let ordered = order_packages(root, packages, options);

    let mut builder = MergePlanBuilder::new(paths);
    for package in ordered {
        builder.add_package(package)?;
    }
    builder.add_root_config(root.config());
    builder.add_environments(environments);
    Ok(builder.into_plan())
}

/// Build the merge plan and persist it, honoring the
/// `build_merge_plan` option.
pub fn build_and_save(
    paths: &ConfigPaths,
    options: &Options,
    root: &Package,
    packages: &[Package],
    environments: &EnvironmentsConfig,
) -> Result<MergePlan> {
    let plan = build_merge_plan(paths, options, root, packages, environments)?;
    if options.build_merge_plan {
        plan.save_to(&paths.plan_path(&options.merge_plan_file))?;
    }
    Ok(plan)
}
