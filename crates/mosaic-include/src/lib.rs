//! # Mosaic Include - Cross-entity data inclusion for context trees
//!
//! `mosaic-include` expands include directives inside a template context tree
//! before it is rendered. A directive is a key starting with `include` whose
//! value names data in another entity's context:
//!
//! ```text
//! include: "...card.meta, title.text as heading!"
//! ```
//!
//! ## Core Concepts
//!
//! - [`get_by_path`]: dotted-path addressing into a tree
//! - [`IncludeDirective`]: one parsed include expression (spread, override, rename)
//! - [`ContextLookup`]: read access to entity contexts, by id
//! - [`Resolver`]: depth-first expansion of every directive in a tree
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use mosaic_include::resolve_includes;
//! use serde_json::json;
//!
//! let mut library = HashMap::new();
//! library.insert("@button".to_string(), json!({"label": "Save", "size": "sm"}));
//!
//! let mut context = json!({
//!     "size": "lg",
//!     "include": "...button",
//! });
//! resolve_includes(&mut context, &library, "@").unwrap();
//!
//! // Authored data wins over included data unless the expression ends with `!`.
//! assert_eq!(context, json!({"size": "lg", "label": "Save"}));
//! ```

mod directive;
mod error;
mod lookup;
mod path;
mod resolve;

pub use directive::{is_directive_key, parse_directive_list, IncludeDirective, DIRECTIVE_PREFIX};
pub use error::{IncludeError, Result};
pub use lookup::{lookup_entity_context, normalize_id, ContextLookup, EntityContext, ESCAPE_MARKER};
pub use path::{get_by_path, member};
pub use resolve::{resolve_includes, Resolver, DEFAULT_HANDLE_PREFIX};
