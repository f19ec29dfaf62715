//! The deep merge algorithm.
//!
//! The merger folds successive configuration documents into a running
//! accumulator, one `(document, Context)` pair per call. List elements
//! concatenate, mapping keys overwrite across layers and conflict within
//! a layer, and the per-group modifiers bend both rules:
//!
//! - **Recursive merge** lets nested mappings (and the lists inside
//!   them) merge element-wise instead of being wholesale overwritten,
//!   down to an optional depth limit.
//! - **Reverse merge** inverts precedence: the first contributor's value
//!   wins and later contributors' list elements are placed in front.
//! - **Vendor key removal** prunes configured key paths from
//!   vendor-layer documents before they participate at all.
//!
//! Duplicate keys are tracked in a first-writer table keyed by
//! `(dotted key path, layer)`. The table is owned by the merger
//! instance, and the resolver creates a fresh merger for every top-level
//! group build, so conflict state never leaks between groups. A second
//! write to the same key path from the same layer aborts the build with
//! a `DuplicateKey` error naming both contributing files relative to the
//! configuration root, shallowest path first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::context::{Context, Layer};
use crate::error::{Error, Result};
use crate::modifiers::Modifiers;
use crate::paths::ConfigPaths;

/// Remaining recursion budget: `None` disables recursion, `Some(None)`
/// is unlimited, `Some(Some(n))` allows `n` more nested levels.
type Budget = Option<Option<usize>>;

fn recursion_active(budget: Budget) -> bool {
    match budget {
        None => false,
        Some(None) => true,
        Some(Some(levels)) => levels > 0,
    }
}

fn descend(budget: Budget) -> Budget {
    match budget {
        Some(Some(levels)) => Some(Some(levels.saturating_sub(1))),
        other => other,
    }
}

/// Merges configuration documents for one group build.
pub struct Merger<'a> {
    modifiers: &'a Modifiers,
    paths: &'a ConfigPaths,
    first_writer: HashMap<(String, Layer), PathBuf>,
}

impl<'a> Merger<'a> {
    /// A fresh merger with an empty first-writer table.
    pub fn new(modifiers: &'a Modifiers, paths: &'a ConfigPaths) -> Self {
        Self {
            modifiers,
            paths,
            first_writer: HashMap::new(),
        }
    }

    /// Merge one document into the accumulator.
    pub fn merge(&mut self, context: &Context, accumulator: Value, document: Value) -> Result<Value> {
        let mut document = document;
        if context.layer().is_vendor() {
            for key_path in self
                .modifiers
                .vendor_key_removals(context.package(), context.group())
            {
                remove_key_path(&mut document, key_path);
            }
        }

        let budget = self.modifiers.recursion(context.group());
        let reverse = self.modifiers.is_reverse(context.group());
        self.merge_values(context, &mut Vec::new(), accumulator, document, budget, reverse)
    }

    /// Merge a whole sequence of documents. Zero documents yield an
    /// empty mapping; a single document is returned unchanged.
    pub fn merge_all(&mut self, context: &Context, documents: Vec<Value>) -> Result<Value> {
        let mut accumulator = Value::Object(Map::new());
        for document in documents {
            accumulator = self.merge(context, accumulator, document)?;
        }
        Ok(accumulator)
    }

    fn merge_values(
        &mut self,
        context: &Context,
        key_path: &mut Vec<String>,
        base: Value,
        incoming: Value,
        budget: Budget,
        reverse: bool,
    ) -> Result<Value> {
        match (base, incoming) {
            (Value::Object(base_map), Value::Object(incoming_map)) => {
                let mut base_map = base_map;
                for (key, value) in incoming_map {
                    key_path.push(key.clone());
                    match base_map.remove(&key) {
                        Some(existing) => {
                            let merged = self.merge_existing(
                                context, key_path, existing, value, budget, reverse,
                            )?;
                            base_map.insert(key, merged);
                        }
                        None => {
                            self.track(key_path, Some(&value), context, budget);
                            base_map.insert(key, value);
                        }
                    }
                    key_path.pop();
                }
                Ok(Value::Object(base_map))
            }
            (Value::Array(base_items), Value::Array(incoming_items)) => {
                Ok(Value::Array(merge_lists(base_items, incoming_items, reverse)))
            }
            (_, incoming) => Ok(incoming),
        }
    }

    /// Merge an incoming value onto a key that already holds one.
    fn merge_existing(
        &mut self,
        context: &Context,
        key_path: &mut Vec<String>,
        existing: Value,
        incoming: Value,
        budget: Budget,
        reverse: bool,
    ) -> Result<Value> {
        if recursion_active(budget) {
            if existing.is_object() && incoming.is_object() {
                return self.merge_values(
                    context,
                    key_path,
                    existing,
                    incoming,
                    descend(budget),
                    reverse,
                );
            }
            if let (Value::Array(base_items), Value::Array(incoming_items)) =
                (&existing, &incoming)
            {
                return Ok(Value::Array(merge_lists(
                    base_items.clone(),
                    incoming_items.clone(),
                    reverse,
                )));
            }
        }

        let dotted = key_path.join(".");
        let layer = context.layer();
        if let Some(previous) = self.first_writer.get(&(dotted.clone(), layer)) {
            return Err(self.duplicate_key(&dotted, previous.clone(), context.file()));
        }

        if reverse {
            // First contributor wins; record this layer's claim without
            // replacing the value.
            self.track(key_path, None, context, budget);
            Ok(existing)
        } else {
            self.track(key_path, Some(&incoming), context, budget);
            Ok(incoming)
        }
    }

    /// Record the first writer of a key path at this context's layer,
    /// descending into nested mapping keys while the recursion budget
    /// allows the merger to reach them later.
    fn track(&mut self, key_path: &mut Vec<String>, value: Option<&Value>, context: &Context, budget: Budget) {
        let dotted = key_path.join(".");
        self.first_writer
            .entry((dotted, context.layer()))
            .or_insert_with(|| context.file().to_path_buf());

        if !recursion_active(budget) {
            return;
        }
        if let Some(Value::Object(map)) = value {
            for (key, child) in map {
                key_path.push(key.clone());
                self.track(key_path, Some(child), context, descend(budget));
                key_path.pop();
            }
        }
    }

    fn duplicate_key(&self, dotted: &str, previous: PathBuf, current: &Path) -> Error {
        let mut files = vec![
            self.paths.relative(&previous),
            self.paths.relative(current),
        ];
        files.sort_by(|a, b| {
            let depth_a = a.matches('/').count();
            let depth_b = b.matches('/').count();
            depth_a.cmp(&depth_b).then_with(|| a.cmp(b))
        });
        Error::DuplicateKey {
            key_path: dotted.to_string(),
            files,
        }
    }
}

/// Concatenate list elements, skipping an element that is already
/// present at the same position. Under reverse merge the incoming
/// contributor's elements come first.
fn merge_lists(base: Vec<Value>, incoming: Vec<Value>, reverse: bool) -> Vec<Value> {
    let (mut result, additions) = if reverse { (incoming, base) } else { (base, incoming) };
    for (index, item) in additions.into_iter().enumerate() {
        if result.get(index) == Some(&item) {
            continue;
        }
        result.push(item);
    }
    result
}

/// Remove one nested key path from a document, if present.
fn remove_key_path(document: &mut Value, key_path: &[String]) {
    let Some((last, parents)) = key_path.split_last() else {
        return;
    };
    let mut current = document;
    for segment in parents {
        match current.as_object_mut().and_then(|map| map.get_mut(segment)) {
            Some(child) => current = child,
            None => return,
        }
    }
    if let Some(map) = current.as_object_mut() {
        map.remove(last);
    }
}
