//! Expanding a merge-plan group into the ordered file list to merge.
//!
//! At resolution time the extractor walks a group's packages in plan
//! storage order and turns every file spec into an `(absolute path,
//! Context)` pair:
//!
//! - the default environment's section is processed first, then the
//!   active environment's overlay with every entry at the `Environment`
//!   layer;
//! - environment-scoped entries apply only when their tag matches the
//!   active environment and are likewise upgraded to the `Environment`
//!   layer;
//! - a vendor package's whole contribution is skipped when a
//!   remove-groups-from-vendor pattern matches it;
//! - wildcards are glob-expanded against the live filesystem now, not
//!   against the state the plan was built from, so files that appeared
//!   since the last plan build still participate;
//! - results are deduplicated by absolute path, first occurrence wins.
//!
//! `$group` variable entries pass through as references for the
//! resolver to chase; inside an environment overlay they are rejected
//! outright.

use std::collections::HashSet;
use std::path::PathBuf;

use glob::Pattern;
use log::{debug, warn};

use crate::context::{Context, Layer};
use crate::error::{Error, Result};
use crate::modifiers::Modifiers;
use crate::paths::ConfigPaths;
use crate::plan::{GroupPlan, MergePlan, DEFAULT_ENVIRONMENT, ROOT_PACKAGE_NAME};
use crate::spec::{self, FileSpec};

/// Expands merge-plan groups for one resolver instance.
pub struct FilesExtractor<'a> {
    paths: &'a ConfigPaths,
    modifiers: &'a Modifiers,
    vendor_override: &'a [Pattern],
    environment: &'a str,
}

impl<'a> FilesExtractor<'a> {
    pub fn new(
        paths: &'a ConfigPaths,
        modifiers: &'a Modifiers,
        vendor_override: &'a [Pattern],
        environment: &'a str,
    ) -> Self {
        Self {
            paths,
            modifiers,
            vendor_override,
            environment,
        }
    }

    /// Produce the ordered, deduplicated entry list for a group.
    ///
    /// # Errors
    ///
    /// - `Error::GroupNotFound` when the group is absent from both the
    ///   active and the default environment.
    /// - `Error::FileNotFound` when a non-optional spec resolves to
    ///   zero existing files.
    /// - `Error::InvalidVariable` when a `$group` spec appears inside a
    ///   named-environment overlay.
    pub fn extract(&self, plan: &MergePlan, group: &str) -> Result<Vec<(PathBuf, Context)>> {
        let default_section = plan.group(DEFAULT_ENVIRONMENT, group);
        let environment_section = if self.environment == DEFAULT_ENVIRONMENT {
            None
        } else {
            plan.group(self.environment, group)
        };

        if default_section.is_none() && environment_section.is_none() {
            return Err(Error::GroupNotFound {
                group: group.to_string(),
            });
        }

        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        if let Some(section) = default_section {
            self.collect(group, section, false, &mut entries, &mut seen)?;
        }
        if let Some(section) = environment_section {
            self.collect(group, section, true, &mut entries, &mut seen)?;
        }
        debug!("extracted {} entries for group \"{}\"", entries.len(), group);
        Ok(entries)
    }

    fn collect(
        &self,
        group: &str,
        section: &GroupPlan,
        environment_overlay: bool,
        entries: &mut Vec<(PathBuf, Context)>,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        for (package, specs) in section.packages() {
            let package_layer = if environment_overlay {
                Layer::Environment
            } else {
                self.package_layer(package)
            };

            if package_layer.is_vendor()
                && self.modifiers.is_group_removed_from_vendor(package, group)
            {
                debug!(
                    "skipping \"{}\" contribution of {} (removed from vendor)",
                    group, package
                );
                continue;
            }

            for file_spec in specs {
                let (layer, token) = match file_spec {
                    FileSpec::Path(token) => (package_layer, token.as_str()),
                    FileSpec::EnvScoped(environment, token) => {
                        if environment != self.environment {
                            continue;
                        }
                        (Layer::Environment, token.as_str())
                    }
                };
                self.collect_token(group, package, layer, token, entries, seen)?;
            }
        }
        Ok(())
    }

    fn collect_token(
        &self,
        group: &str,
        package: &str,
        layer: Layer,
        token: &str,
        entries: &mut Vec<(PathBuf, Context)>,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        let optional = spec::is_optional(token);
        let body = spec::strip_optional(token);

        if spec::is_variable(body) {
            if layer == Layer::Environment {
                return Err(Error::InvalidVariable {
                    message: format!(
                        "\"{}\" cannot be used inside an environment overlay of group \"{}\"",
                        body, group
                    ),
                });
            }
            let reference = PathBuf::from(body);
            if seen.insert(reference.clone()) {
                entries.push((
                    reference.clone(),
                    Context::new(group, package, layer, reference, true),
                ));
            }
            return Ok(());
        }

        let absolute = self.paths.absolute(package, body);

        if spec::is_wildcard(body) {
            let matches: Vec<PathBuf> = glob::glob(&absolute.to_string_lossy())?
                .filter_map(std::result::Result::ok)
                .filter(|path| path.is_file())
                .collect();
            if matches.is_empty() && !optional {
                return Err(Error::FileNotFound {
                    path: self.paths.relative(&absolute),
                });
            }
            for path in matches {
                if seen.insert(path.clone()) {
                    entries.push((
                        path.clone(),
                        Context::new(group, package, layer, path, false),
                    ));
                }
            }
            return Ok(());
        }

        if !absolute.is_file() {
            if optional {
                warn!("optional file missing: {}", self.paths.relative(&absolute));
                return Ok(());
            }
            return Err(Error::FileNotFound {
                path: self.paths.relative(&absolute),
            });
        }

        if seen.insert(absolute.clone()) {
            entries.push((
                absolute.clone(),
                Context::new(group, package, layer, absolute, false),
            ));
        }
        Ok(())
    }

    fn package_layer(&self, package: &str) -> Layer {
        if package == ROOT_PACKAGE_NAME {
            Layer::Application
        } else if self
            .vendor_override
            .iter()
            .any(|pattern| pattern.matches(package))
        {
            Layer::VendorOverride
        } else {
            Layer::Vendor
        }
    }
}
