//! Determining package merge order.
//!
//! The merge precedence of a package follows its distance from the root
//! of the dependency graph: the deeper a package sits, the earlier its
//! configuration is applied, so that packages closer to the application
//! naturally override it and the application's own settings form the
//! last, highest-precedence layer.
//!
//! ## Process
//!
//! 1. **Signed-depth walk**: starting at the root package (depth 0),
//!    every dependency edge decrements the depth. Dev dependencies are
//!    traversed from the root only, never transitively.
//!
//! 2. **Revisit rule**: when a package is reachable through several
//!    paths, the larger depth wins — a package that is both a direct and
//!    a transitive dependency is treated as the direct one. Traversal
//!    stops at already-visited nodes, which also guarantees termination
//!    on cyclic graphs.
//!
//! 3. **Stable sort**: discovered packages are sorted by depth
//!    ascending, with ties broken by first-discovery order rather than
//!    by name. The result is deterministic for a fixed graph without
//!    being alphabetically biased.
//!
//! Packages whose type is not in the accepted list are excluded and not
//! traversed through, even when depended upon. The root package itself
//! is not part of the result; the plan builder layers its configuration
//! separately.

use std::collections::HashMap;

use log::debug;

use crate::options::Options;
use crate::package::Package;

/// Compute the merge order for the given packages.
///
/// `root` supplies the starting dependency edges; `packages` is the flat
/// set reported by the dependency manager. Returns references into
/// `packages`, deepest dependencies first. Never fails: unknown
/// dependency names and cycles are silently tolerated.
pub fn order_packages<'a>(
    root: &Package,
    packages: &'a [Package],
    options: &Options,
) -> Vec<&'a Package> {
    let by_name: HashMap<&str, &Package> =
        packages.iter().map(|p| (p.name(), p)).collect();

    let mut depths: HashMap<&'a str, i64> = HashMap::new();
    let mut discovered: Vec<&'a str> = Vec::new();

    // Dev edges participate only for the root package.
    let root_edges = root.requires().iter().chain(root.dev_requires().iter());
    for dependency in root_edges {
        visit(dependency, -1, &by_name, options, &mut depths, &mut discovered);
    }

    let mut ordered = discovered;
    ordered.sort_by_key(|name| depths[name]);

    debug!("ordered {} of {} packages", ordered.len(), packages.len());
    ordered
        .into_iter()
        .filter_map(|name| by_name.get(name).copied())
        .collect()
}

fn visit<'a>(
    name: &str,
    depth: i64,
    by_name: &HashMap<&str, &'a Package>,
    options: &Options,
    depths: &mut HashMap<&'a str, i64>,
    discovered: &mut Vec<&'a str>,
) {
    let Some(package) = by_name.get(name).copied() else {
        // Depended upon but not reported by the dependency manager.
        return;
    };
    if !options.is_accepted_type(package.package_type()) {
        return;
    }

    if let Some(existing) = depths.get_mut(package.name()) {
        // Keep the larger depth; never re-traverse a visited node.
        if depth > *existing {
            *existing = depth;
        }
        return;
    }

    depths.insert(package.name(), depth);
    discovered.push(package.name());

    for dependency in package.requires() {
        visit(dependency, depth - 1, by_name, options, depths, discovered);
    }
}
