//! Context resolution: expands include directives across a context tree.
//!
//! The resolver walks the tree depth-first. Each directive key is removed from
//! the mapping that holds it and evaluated against that mapping. Values placed
//! by a directive are resolved in turn, so included data can include more data.
//! Directive keys written by a spread are expanded while the spreading include
//! is still on the stack, even when they reuse the name of a key already consumed.
//!
//! Writes are gated on "absent or override": data authored in the tree wins
//! over included data unless the expression ends in `!`.
//!
//! Expansion chains are tracked as `id.path` frames. Meeting a frame that is
//! already being expanded fails with [`IncludeError::CyclicInclude`] instead of
//! recursing forever.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::directive::{is_directive_key, parse_directive_list, IncludeDirective};
use crate::error::{IncludeError, Result};
use crate::lookup::{lookup_entity_context, ContextLookup};
use crate::path::{get_by_path, member};

/// Handle prefix used when none is configured.
pub const DEFAULT_HANDLE_PREFIX: &str = "@";

/// Expands include directives using a [`ContextLookup`].
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use mosaic_include::Resolver;
/// use serde_json::json;
///
/// let mut library = HashMap::new();
/// library.insert("@card".to_string(), json!({"meta": {"color": "red", "size": "lg"}}));
/// library.insert("@title".to_string(), json!({"text": {"text": "Hello"}}));
///
/// let mut tree = json!({"include": "...card.meta, title.text as heading!"});
/// Resolver::new(&library).resolve(&mut tree).unwrap();
///
/// assert_eq!(tree, json!({"color": "red", "size": "lg", "heading": {"text": "Hello"}}));
/// ```
pub struct Resolver<'a, L: ?Sized> {
    lookup: &'a L,
    handle_prefix: String,
    active: Vec<String>,
}

impl<'a, L: ContextLookup + ?Sized> Resolver<'a, L> {
    /// Creates a resolver with the default `@` handle prefix.
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            handle_prefix: DEFAULT_HANDLE_PREFIX.to_string(),
            active: Vec::new(),
        }
    }

    /// Sets the handle prefix prepended to entity names.
    pub fn with_handle_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.handle_prefix = prefix.into();
        self
    }

    /// Resolves every directive in `tree`, in place.
    ///
    /// # Errors
    ///
    /// Fails on unknown entities, cyclic includes, malformed expressions and
    /// paths that step through missing values. The tree may be partially
    /// resolved when an error is returned.
    pub fn resolve(&mut self, tree: &mut Value) -> Result<()> {
        self.active.clear();
        self.resolve_node(tree)
    }

    fn resolve_node(&mut self, node: &mut Value) -> Result<()> {
        match node {
            Value::Object(map) => self.resolve_mapping(map),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if item.is_object() || item.is_array() {
                        self.resolve_node(item)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn resolve_mapping(&mut self, map: &mut Map<String, Value>) -> Result<()> {
        // Data keys already resolved. Directive keys are never marked: a spread
        // may write one back, and it must be expanded again.
        let mut visited: HashSet<String> = HashSet::new();

        loop {
            let pending: Vec<String> = map
                .iter()
                .filter(|(key, value)| {
                    if is_directive_key(key) && value.is_string() {
                        true
                    } else {
                        !visited.contains(*key)
                    }
                })
                .map(|(key, _)| key.clone())
                .collect();
            if pending.is_empty() {
                return Ok(());
            }

            for key in pending {
                if !is_directive_key(&key) {
                    visited.insert(key.clone());
                    if let Some(value) = map.get_mut(&key) {
                        self.resolve_node(value)?;
                    }
                    continue;
                }
                if map.get(&key).is_some_and(|value| !value.is_string()) {
                    warn!(key = %key, "include directive value is not a string, leaving it as data");
                    visited.insert(key);
                    continue;
                }
                visited.extend(self.expand(map, &key)?);
            }
        }
    }

    /// Removes the directive stored under `key` and evaluates its expressions
    /// against `map`, returning the data keys written.
    fn expand(&mut self, map: &mut Map<String, Value>, key: &str) -> Result<Vec<String>> {
        let expressions = match map.get(key) {
            Some(Value::String(expressions)) => expressions.clone(),
            _ => return Ok(Vec::new()),
        };
        map.shift_remove(key);

        let mut written = Vec::new();
        for directive in parse_directive_list(&expressions)? {
            written.extend(self.apply(map, &directive)?);
        }
        Ok(written)
    }

    /// Evaluates one expression against `dest`, returning the data keys it wrote.
    ///
    /// Directive keys the expression writes into `dest` are expanded before
    /// its frame is left, so a chain of spreads is tracked like nested includes.
    fn apply(
        &mut self,
        dest: &mut Map<String, Value>,
        directive: &IncludeDirective,
    ) -> Result<Vec<String>> {
        let source =
            lookup_entity_context(self.lookup, &directive.context_name, &self.handle_prefix)?;

        let frame = match &directive.path {
            Some(path) => format!("{}.{}", source.resolved_id, path),
            None => source.resolved_id.clone(),
        };
        if self.active.contains(&frame) {
            let mut chain = self.active.clone();
            chain.push(frame);
            return Err(IncludeError::CyclicInclude { chain });
        }

        debug!(
            source = %directive.source_ref,
            spread = directive.spread,
            overrides = directive.overrides,
            rename = ?directive.rename,
            "applying include"
        );

        self.active.push(frame);
        let written = if directive.spread {
            self.spread(dest, directive, &source.context)
        } else {
            self.place(dest, directive, &source.context)
        }
        .and_then(|placed| self.expand_placed(dest, placed));
        self.active.pop();
        written
    }

    fn expand_placed(
        &mut self,
        dest: &mut Map<String, Value>,
        placed: Vec<String>,
    ) -> Result<Vec<String>> {
        let mut written = Vec::new();
        for key in placed {
            if is_directive_key(&key) {
                written.extend(self.expand(dest, &key)?);
            } else {
                written.push(key);
            }
        }
        Ok(written)
    }

    fn spread(
        &mut self,
        dest: &mut Map<String, Value>,
        directive: &IncludeDirective,
        context: &Value,
    ) -> Result<Vec<String>> {
        let source_data = get_by_path(context, directive.path.as_deref(), false)?;
        let Some(Value::Object(properties)) = source_data else {
            debug!(source = %directive.source_ref, "spread source is not a mapping, nothing to place");
            return Ok(Vec::new());
        };

        let mut placed = Vec::new();
        for (property, value) in properties {
            if !directive.overrides && dest.contains_key(property) {
                continue;
            }
            let mut value = value.clone();
            self.resolve_node(&mut value)?;
            dest.insert(property.clone(), value);
            placed.push(property.clone());
        }
        Ok(placed)
    }

    fn place(
        &mut self,
        dest: &mut Map<String, Value>,
        directive: &IncludeDirective,
        context: &Value,
    ) -> Result<Vec<String>> {
        let destination = directive
            .destination()
            .ok_or_else(|| IncludeError::MissingDestination {
                expression: directive.source_ref.clone(),
            })?
            .to_string();

        let source_value = match (directive.path.as_deref(), directive.last_part.as_deref()) {
            (Some(path), Some(last_part)) => {
                let container = get_by_path(context, Some(path), true)?;
                member(container, last_part, path)?
            }
            _ => Some(context),
        };

        let Some(source_value) = source_value else {
            debug!(source = %directive.source_ref, "include source is absent, skipping");
            return Ok(Vec::new());
        };
        if !directive.overrides && dest.contains_key(&destination) {
            return Ok(Vec::new());
        }

        let mut value = source_value.clone();
        self.resolve_node(&mut value)?;
        dest.insert(destination.clone(), value);
        Ok(vec![destination])
    }
}

/// Resolves every directive in `tree` with the given lookup and handle prefix.
pub fn resolve_includes<L: ContextLookup + ?Sized>(
    tree: &mut Value,
    lookup: &L,
    handle_prefix: &str,
) -> Result<()> {
    Resolver::new(lookup)
        .with_handle_prefix(handle_prefix)
        .resolve(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn library(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(id, ctx)| (id.to_string(), ctx.clone()))
            .collect()
    }

    fn resolved(tree: Value, lib: &HashMap<String, Value>) -> Value {
        let mut tree = tree;
        Resolver::new(lib).resolve(&mut tree).unwrap();
        tree
    }

    #[test]
    fn spread_places_every_property() {
        let lib = library(&[("@card", json!({"meta": {"color": "red", "size": "lg"}}))]);
        let tree = resolved(json!({"include": "...card.meta"}), &lib);
        assert_eq!(tree, json!({"color": "red", "size": "lg"}));
    }

    #[test]
    fn narrow_include_places_single_value() {
        let lib = library(&[("@card", json!({"meta": {"color": "red", "size": "lg"}}))]);
        let tree = resolved(json!({"include": "card.meta.color"}), &lib);
        assert_eq!(tree, json!({"color": "red"}));
    }

    #[test]
    fn existing_data_wins_without_override() {
        let lib = library(&[("@card", json!({"meta": {"color": "red", "size": "lg"}}))]);
        let tree = resolved(json!({"color": "blue", "include": "...card.meta"}), &lib);
        assert_eq!(tree, json!({"color": "blue", "size": "lg"}));
    }

    #[test]
    fn override_replaces_existing_data() {
        let lib = library(&[("@card", json!({"meta": {"color": "red"}}))]);
        let tree = resolved(json!({"color": "blue", "include": "card.meta.color!"}), &lib);
        assert_eq!(tree, json!({"color": "red"}));
    }

    #[test]
    fn rename_stores_whole_context() {
        let lib = library(&[("@card", json!({"title": "Card"}))]);
        let tree = resolved(json!({"include": "card as card"}), &lib);
        assert_eq!(tree, json!({"card": {"title": "Card"}}));
    }

    #[test]
    fn spread_of_whole_context() {
        let lib = library(&[("@card", json!({"title": "Card", "body": "Text"}))]);
        let tree = resolved(json!({"include": "...card"}), &lib);
        assert_eq!(tree, json!({"title": "Card", "body": "Text"}));
    }

    #[test]
    fn nested_directives_are_resolved() {
        let lib = library(&[("@card", json!({"meta": {"color": "red"}}))]);
        let tree = resolved(
            json!({"items": [{"includeMeta": "card.meta"}, "plain"], "child": {"include": "...card.meta"}}),
            &lib,
        );
        assert_eq!(
            tree,
            json!({"items": [{"meta": {"color": "red"}}, "plain"], "child": {"color": "red"}})
        );
    }

    #[test]
    fn included_values_are_resolved_recursively() {
        let lib = library(&[
            ("@page", json!({"header": {"include": "...title.text"}})),
            ("@title", json!({"text": {"label": "Hello"}})),
        ]);
        let tree = resolved(json!({"include": "page.header"}), &lib);
        assert_eq!(tree, json!({"header": {"label": "Hello"}}));
    }

    #[test]
    fn spread_can_introduce_directives() {
        let lib = library(&[
            ("@wrapper", json!({"inner": {"includeTitle": "title.text"}})),
            ("@title", json!({"text": "Hello"})),
        ]);
        let tree = resolved(json!({"include": "...wrapper.inner"}), &lib);
        assert_eq!(tree, json!({"text": "Hello"}));
    }

    #[test]
    fn absent_source_property_is_skipped() {
        let lib = library(&[("@card", json!({"meta": {}}))]);
        let tree = resolved(json!({"keep": 1, "include": "card.meta.color"}), &lib);
        assert_eq!(tree, json!({"keep": 1}));
    }

    #[test]
    fn source_is_not_mutated() {
        let lib = library(&[("@card", json!({"meta": {"include": "title.text"}})), ("@title", json!({"text": "Hi"}))]);
        let _ = resolved(json!({"include": "card.meta"}), &lib);
        assert_eq!(lib["@card"], json!({"meta": {"include": "title.text"}}));
    }

    #[test]
    fn non_string_directive_is_left_alone() {
        let lib = library(&[]);
        let tree = resolved(json!({"includes": ["a", "b"]}), &lib);
        assert_eq!(tree, json!({"includes": ["a", "b"]}));
    }

    #[test]
    fn unknown_entity_fails() {
        let lib = library(&[]);
        let mut tree = json!({"include": "missing.value"});
        let err = Resolver::new(&lib).resolve(&mut tree).unwrap_err();
        assert_eq!(err, IncludeError::EntityNotFound { id: "@missing".into() });
    }

    #[test]
    fn cyclic_includes_fail_fast() {
        let lib = library(&[
            ("@a", json!({"x": {"include": "b.y"}})),
            ("@b", json!({"y": {"include": "a.x"}})),
        ]);
        let mut tree = json!({"include": "a.x"});
        let err = Resolver::new(&lib).resolve(&mut tree).unwrap_err();
        assert_eq!(
            err,
            IncludeError::CyclicInclude {
                chain: vec!["@a.x".into(), "@b.y".into(), "@a.x".into()]
            }
        );
    }

    #[test]
    fn spread_chain_reusing_directive_keys_is_consumed() {
        let lib = library(&[
            ("@a", json!({"include": "...b"})),
            ("@b", json!({"includeP": "...c"})),
            ("@c", json!({"done": true})),
        ]);
        let tree = resolved(json!({"includeP": "...a"}), &lib);
        assert_eq!(tree, json!({"done": true}));
    }

    #[test]
    fn spread_cycle_fails_fast() {
        let lib = library(&[
            ("@a", json!({"includeB": "...b"})),
            ("@b", json!({"includeA": "...a"})),
        ]);
        let mut tree = json!({"include": "...a"});
        let err = Resolver::new(&lib).resolve(&mut tree).unwrap_err();
        assert_eq!(
            err,
            IncludeError::CyclicInclude {
                chain: vec!["@a".into(), "@b".into(), "@a".into()]
            }
        );
    }

    #[test]
    fn spread_directive_with_non_string_value_stays_data() {
        let lib = library(&[("@a", json!({"includes": [1, 2], "x": 1}))]);
        let tree = resolved(json!({"include": "...a"}), &lib);
        assert_eq!(tree, json!({"includes": [1, 2], "x": 1}));
    }

    #[test]
    fn repeated_sibling_includes_are_not_cycles() {
        let lib = library(&[("@title", json!({"text": "Hi"}))]);
        let tree = resolved(
            json!({"a": {"include": "title.text"}, "b": {"include": "title.text"}}),
            &lib,
        );
        assert_eq!(tree, json!({"a": {"text": "Hi"}, "b": {"text": "Hi"}}));
    }

    #[test]
    fn custom_handle_prefix() {
        let lib = library(&[("#card", json!({"title": "Card"}))]);
        let mut tree = json!({"include": "$card.title"});
        resolve_includes(&mut tree, &lib, "#").unwrap();
        assert_eq!(tree, json!({"title": "Card"}));
    }

    #[test]
    fn directive_key_order_is_preserved() {
        let lib = library(&[("@card", json!({"meta": {"b": 2}}))]);
        let tree = resolved(json!({"a": 1, "include": "...card.meta", "c": 3}), &lib);
        let keys: Vec<&String> = tree.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["a", "c", "b"]);
    }
}
