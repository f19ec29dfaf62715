//! Declarative merge-behavior modifiers.
//!
//! Modifiers are constructed once by the embedding application and
//! passed to the resolver; they are never global state. Four kinds
//! exist:
//!
//! - **Recursive merge**: nested mappings in the listed groups merge
//!   key-by-key instead of being wholesale overwritten, optionally up to
//!   a depth limit.
//! - **Reverse merge**: inverts the default "later contributor wins"
//!   precedence for the listed groups, so the earliest contributor sets
//!   the values others can no longer override.
//! - **Remove groups from vendor**: drops entire group contributions
//!   from vendor-layer packages, matched by package/group patterns with
//!   `*` wildcards.
//! - **Remove keys from vendor**: prunes specific nested key paths from
//!   vendor-layer documents before they are merged, optionally scoped to
//!   package (and group) patterns.
//!
//! Declarations are compiled once into lookup indices so that the hot
//! membership tests during merging stay cheap.

use std::collections::{HashMap, HashSet};

use glob::Pattern;

use crate::error::Result;

/// One modifier declaration.
#[derive(Debug, Clone)]
pub enum Modifier {
    /// Merge nested mappings of the listed groups recursively.
    /// `depth: None` recurses without limit; `depth: Some(n)` merges
    /// plainly beyond `n` nested levels.
    RecursiveMerge {
        groups: Vec<String>,
        depth: Option<usize>,
    },
    /// Make the earliest contributor win in the listed groups.
    ReverseMerge { groups: Vec<String> },
    /// Skip whole group contributions from matching vendor packages.
    /// Each pair is `(package pattern, group pattern)`; `*` wildcards
    /// are allowed on either axis.
    RemoveGroupsFromVendor { patterns: Vec<(String, String)> },
    /// Prune nested key paths from vendor documents before merging.
    /// An empty scope applies to every vendor package and group; a
    /// scope entry restricts the rule to a package pattern and,
    /// optionally, a group pattern.
    RemoveKeysFromVendor {
        key_paths: Vec<Vec<String>>,
        scope: Vec<(String, Option<String>)>,
    },
}

impl Modifier {
    /// Unlimited recursive merge for the given groups.
    pub fn recursive_merge(groups: &[&str]) -> Self {
        Modifier::RecursiveMerge {
            groups: groups.iter().map(|g| g.to_string()).collect(),
            depth: None,
        }
    }

    /// Recursive merge limited to `depth` nested levels.
    pub fn recursive_merge_with_depth(groups: &[&str], depth: usize) -> Self {
        Modifier::RecursiveMerge {
            groups: groups.iter().map(|g| g.to_string()).collect(),
            depth: Some(depth),
        }
    }

    /// Reverse merge for the given groups.
    pub fn reverse_merge(groups: &[&str]) -> Self {
        Modifier::ReverseMerge {
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }
}

#[derive(Debug)]
struct RemoveKeysRule {
    key_paths: Vec<Vec<String>>,
    scope: Vec<(Pattern, Option<Pattern>)>,
}

/// Compiled modifier set with precomputed lookup indices.
#[derive(Debug, Default)]
pub struct Modifiers {
    recursive: HashMap<String, Option<usize>>,
    reverse: HashSet<String>,
    removed_groups: Vec<(Pattern, Pattern)>,
    removed_keys: Vec<RemoveKeysRule>,
}

impl Modifiers {
    /// Compile a set of declarations.
    ///
    /// # Errors
    ///
    /// Returns `Error::Glob` when a package or group pattern is not a
    /// valid glob pattern.
    pub fn new(declarations: Vec<Modifier>) -> Result<Self> {
        let mut compiled = Modifiers::default();
        for declaration in declarations {
            match declaration {
                Modifier::RecursiveMerge { groups, depth } => {
                    for group in groups {
                        compiled.recursive.insert(group, depth);
                    }
                }
                Modifier::ReverseMerge { groups } => {
                    compiled.reverse.extend(groups);
                }
                Modifier::RemoveGroupsFromVendor { patterns } => {
                    for (package, group) in patterns {
                        compiled
                            .removed_groups
                            .push((Pattern::new(&package)?, Pattern::new(&group)?));
                    }
                }
                Modifier::RemoveKeysFromVendor { key_paths, scope } => {
                    let mut compiled_scope = Vec::with_capacity(scope.len());
                    for (package, group) in scope {
                        let group = match group {
                            Some(group) => Some(Pattern::new(&group)?),
                            None => None,
                        };
                        compiled_scope.push((Pattern::new(&package)?, group));
                    }
                    compiled.removed_keys.push(RemoveKeysRule {
                        key_paths,
                        scope: compiled_scope,
                    });
                }
            }
        }
        Ok(compiled)
    }

    /// The recursion depth budget for a group: `None` when the group
    /// merges shallowly, `Some(None)` for unlimited recursion, and
    /// `Some(Some(n))` for a depth-limited one.
    pub fn recursion(&self, group: &str) -> Option<Option<usize>> {
        self.recursive.get(group).copied()
    }

    /// Whether the group merges in reverse order.
    pub fn is_reverse(&self, group: &str) -> bool {
        self.reverse.contains(group)
    }

    /// Whether a vendor package's contribution to a group is removed
    /// entirely.
    pub fn is_group_removed_from_vendor(&self, package: &str, group: &str) -> bool {
        self.removed_groups
            .iter()
            .any(|(p, g)| p.matches(package) && g.matches(group))
    }

    /// The key paths to prune from a vendor document contributed by the
    /// given package to the given group.
    pub fn vendor_key_removals(&self, package: &str, group: &str) -> Vec<&[String]> {
        let mut key_paths = Vec::new();
        for rule in &self.removed_keys {
            let applies = rule.scope.is_empty()
                || rule.scope.iter().any(|(p, g)| {
                    p.matches(package) && g.as_ref().map_or(true, |g| g.matches(group))
                });
            if applies {
                key_paths.extend(rule.key_paths.iter().map(|path| path.as_slice()));
            }
        }
        key_paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursion_lookup() {
        let modifiers = Modifiers::new(vec![
            Modifier::recursive_merge(&["params"]),
            Modifier::recursive_merge_with_depth(&["web"], 2),
        ])
        .unwrap();

        assert_eq!(modifiers.recursion("params"), Some(None));
        assert_eq!(modifiers.recursion("web"), Some(Some(2)));
        assert_eq!(modifiers.recursion("console"), None);
    }

    #[test]
    fn test_reverse_lookup() {
        let modifiers = Modifiers::new(vec![Modifier::reverse_merge(&["events"])]).unwrap();
        assert!(modifiers.is_reverse("events"));
        assert!(!modifiers.is_reverse("params"));
    }

    #[test]
    fn test_group_removal_with_wildcards() {
        let modifiers = Modifiers::new(vec![Modifier::RemoveGroupsFromVendor {
            patterns: vec![
                ("*".to_string(), "params".to_string()),
                ("acme/*".to_string(), "web".to_string()),
            ],
        }])
        .unwrap();

        assert!(modifiers.is_group_removed_from_vendor("acme/cache", "params"));
        assert!(modifiers.is_group_removed_from_vendor("other/pkg", "params"));
        assert!(modifiers.is_group_removed_from_vendor("acme/cache", "web"));
        assert!(!modifiers.is_group_removed_from_vendor("other/pkg", "web"));
    }

    #[test]
    fn test_key_removal_scoping() {
        let modifiers = Modifiers::new(vec![Modifier::RemoveKeysFromVendor {
            key_paths: vec![vec!["secrets".to_string(), "token".to_string()]],
            scope: vec![("acme/*".to_string(), Some("params".to_string()))],
        }])
        .unwrap();

        let hits = modifiers.vendor_key_removals("acme/cache", "params");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0], ["secrets".to_string(), "token".to_string()]);

        assert!(modifiers.vendor_key_removals("acme/cache", "web").is_empty());
        assert!(modifiers.vendor_key_removals("other/pkg", "params").is_empty());
    }

    #[test]
    fn test_key_removal_unscoped_applies_everywhere() {
        let modifiers = Modifiers::new(vec![Modifier::RemoveKeysFromVendor {
            key_paths: vec![vec!["debug".to_string()]],
            scope: vec![],
        }])
        .unwrap();

        assert_eq!(modifiers.vendor_key_removals("any/pkg", "any-group").len(), 1);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = Modifiers::new(vec![Modifier::RemoveGroupsFromVendor {
            patterns: vec![("[".to_string(), "params".to_string())],
        }]);
        assert!(result.is_err());
    }
}
