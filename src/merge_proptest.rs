//! Property-based tests for package ordering and deep merging.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::context::{Context, Layer};
    use crate::modifiers::{Modifier, Modifiers};
    use crate::options::Options;
    use crate::ordering::order_packages;
    use crate::package::Package;
    use crate::paths::ConfigPaths;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// A small random dependency graph over a fixed name pool. Each
    /// package gets an arbitrary subset of the later names as edges so
    /// that graphs stay acyclic by construction, plus the root may
    /// depend on any of them.
    fn arb_graph() -> impl Strategy<Value = (Package, Vec<Package>)> {
        let names = ["a", "b", "c", "d", "e"];
        let edge_sets = proptest::collection::vec(
            proptest::collection::vec(0usize..names.len(), 0..4),
            names.len(),
        );
        let root_edges = proptest::collection::vec(0usize..names.len(), 0..5);
        (edge_sets, root_edges).prop_map(move |(edge_sets, root_edges)| {
            let packages: Vec<Package> = names
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let requires = edge_sets[index]
                        .iter()
                        .filter(|&&target| target > index)
                        .map(|&target| names[target].to_string())
                        .collect();
                    Package::new(*name, "library").with_requires(requires)
                })
                .collect();
            let root = Package::new("app/root", "project").with_requires(
                root_edges.iter().map(|&i| names[i].to_string()).collect(),
            );
            (root, packages)
        })
    }

    proptest! {
        /// Property: ordering an identical graph twice yields an
        /// identical ordered list.
        #[test]
        fn ordering_is_deterministic((root, packages) in arb_graph()) {
            let options = Options::default();
            let first: Vec<_> = order_packages(&root, &packages, &options)
                .iter()
                .map(|p| p.name().to_string())
                .collect();
            let second: Vec<_> = order_packages(&root, &packages, &options)
                .iter()
                .map(|p| p.name().to_string())
                .collect();
            prop_assert_eq!(first, second);
        }

        /// Property: every ordered package is reachable from the root
        /// and appears exactly once.
        #[test]
        fn ordering_has_no_duplicates((root, packages) in arb_graph()) {
            let options = Options::default();
            let ordered: Vec<_> = order_packages(&root, &packages, &options)
                .iter()
                .map(|p| p.name().to_string())
                .collect();
            let mut deduped = ordered.clone();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(deduped.len(), ordered.len());
        }
    }

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::from),
        ]
    }

    fn merge_documents(groups_recursive: bool, docs: Vec<(Layer, Value)>) -> crate::error::Result<Value> {
        let declarations = if groups_recursive {
            vec![Modifier::recursive_merge(&["web"])]
        } else {
            vec![]
        };
        let modifiers = Modifiers::new(declarations).unwrap();
        let paths = ConfigPaths::new("/app", "config", "vendor");
        let mut merger = crate::merger::Merger::new(&modifiers, &paths);
        let mut accumulator = json!({});
        for (index, (layer, document)) in docs.into_iter().enumerate() {
            let context = Context::new(
                "web",
                format!("pkg-{}", index),
                layer,
                format!("/app/vendor/pkg-{}/web.json", index),
                false,
            );
            accumulator = merger.merge(&context, accumulator, document)?;
        }
        Ok(accumulator)
    }

    proptest! {
        /// Property: merging documents with pairwise disjoint keys never
        /// conflicts and keeps every key, regardless of layers.
        #[test]
        fn disjoint_keys_always_merge(
            left in proptest::collection::btree_map("[a-f]{1,3}", arb_scalar(), 0..5),
            right in proptest::collection::btree_map("[g-m]{1,3}", arb_scalar(), 0..5),
        ) {
            let expected = left.len() + right.len();
            let merged = merge_documents(
                false,
                vec![
                    (Layer::Vendor, json!(left)),
                    (Layer::Vendor, json!(right)),
                ],
            )
            .unwrap();
            prop_assert_eq!(merged.as_object().unwrap().len(), expected);
        }

        /// Property: list concatenation under recursive merge never
        /// loses elements from either side and never exceeds the
        /// combined length.
        #[test]
        fn list_merge_bounds(
            base in proptest::collection::vec(arb_scalar(), 0..6),
            incoming in proptest::collection::vec(arb_scalar(), 0..6),
        ) {
            let merged = merge_documents(
                true,
                vec![
                    (Layer::Vendor, json!({"items": base.clone()})),
                    (Layer::Application, json!({"items": incoming.clone()})),
                ],
            )
            .unwrap();
            let items = merged["items"].as_array().map(Vec::len).unwrap_or(0);
            prop_assert!(items >= base.len().max(incoming.len()));
            prop_assert!(items <= base.len() + incoming.len());
        }

        /// Property: merging a document into an empty accumulator
        /// returns it unchanged.
        #[test]
        fn merge_into_empty_is_identity(
            doc in proptest::collection::btree_map("[a-z]{1,4}", arb_scalar(), 0..6),
        ) {
            let merged = merge_documents(false, vec![(Layer::Application, json!(doc.clone()))])
                .unwrap();
            prop_assert_eq!(merged, json!(doc));
        }
    }
}
