//! Entity context lookup.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::{IncludeError, Result};

/// Escape marker that stands for the configured handle prefix inside a reference.
pub const ESCAPE_MARKER: char = '$';

/// Read access to the context trees of registered entities.
///
/// Implementations resolve a component id to the variant it renders by
/// default; a variant id resolves to that variant.
pub trait ContextLookup {
    /// Returns the context tree of the entity registered under `id`.
    fn context_of(&self, id: &str) -> Option<Value>;
}

impl<T: ContextLookup + ?Sized> ContextLookup for &T {
    fn context_of(&self, id: &str) -> Option<Value> {
        (**self).context_of(id)
    }
}

impl ContextLookup for HashMap<String, Value> {
    fn context_of(&self, id: &str) -> Option<Value> {
        self.get(id).cloned()
    }
}

impl ContextLookup for BTreeMap<String, Value> {
    fn context_of(&self, id: &str) -> Option<Value> {
        self.get(id).cloned()
    }
}

/// A context tree found for an include reference.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityContext {
    /// The normalized id the entity was found under.
    pub resolved_id: String,
    /// The entity's context tree.
    pub context: Value,
}

/// Turns an entity name from a directive into a registry id.
///
/// A leading `$` is replaced by the handle prefix; names already carrying the
/// prefix are kept; anything else gets the prefix prepended.
///
/// ```rust
/// use mosaic_include::normalize_id;
///
/// assert_eq!(normalize_id("card", "@"), "@card");
/// assert_eq!(normalize_id("$card", "@"), "@card");
/// assert_eq!(normalize_id(" @card ", "@"), "@card");
/// ```
pub fn normalize_id(name: &str, handle_prefix: &str) -> String {
    let name = name.trim();
    if let Some(rest) = name.strip_prefix(ESCAPE_MARKER) {
        format!("{handle_prefix}{rest}")
    } else if !handle_prefix.is_empty() && name.starts_with(handle_prefix) {
        name.to_string()
    } else {
        format!("{handle_prefix}{name}")
    }
}

/// Looks up the context of the entity named in a directive.
///
/// # Errors
///
/// [`IncludeError::EntityNotFound`] if nothing is registered under the normalized id.
pub fn lookup_entity_context<L: ContextLookup + ?Sized>(
    lookup: &L,
    name: &str,
    handle_prefix: &str,
) -> Result<EntityContext> {
    let resolved_id = normalize_id(name, handle_prefix);
    match lookup.context_of(&resolved_id) {
        Some(context) => Ok(EntityContext {
            resolved_id,
            context,
        }),
        None => Err(IncludeError::EntityNotFound { id: resolved_id }),
    }
}
