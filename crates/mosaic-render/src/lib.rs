//! # Mosaic Render - Identity-scoped MiniJinja rendering for component libraries
//!
//! `mosaic-render` renders the templates of a component library with
//! MiniJinja. Every render, nested ones included, sees the identity of the
//! entity whose template is running, and compiled templates are dropped as
//! soon as the library reports that their view changed.
//!
//! ## Core Concepts
//!
//! - [`ComponentSource`]: the library being rendered (entities, views, change events)
//! - [`ComponentLibrary`]: in-memory source, buildable from a directory
//! - [`TemplateCache`]: the MiniJinja environment and the only owner of compiled templates
//! - [`RenderInterceptor`]: binds `_self`, imports entity context, resolves includes
//! - [`Adapter`]: the produced `render` operation
//!
//! ## Quick Start
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use mosaic_render::{Adapter, AdapterConfig, Component, ComponentLibrary, RenderMeta};
//! use serde_json::json;
//!
//! let library = Arc::new(ComponentLibrary::new("ui", "/lib"));
//! library.add_component(Component::new("button"), "{{ _self.handle }}");
//! library.add_component(Component::new("card"), "{{ _self.handle }} > {{ render('@button') }}");
//!
//! let config = AdapterConfig::from_yaml("importContext: true").unwrap();
//! let adapter = Adapter::builder(library.clone()).config(config).build();
//!
//! let html = adapter
//!     .render(Path::new("/lib/card.jinja"), None, json!({}), &RenderMeta::new())
//!     .unwrap();
//! assert_eq!(html, "card--default > button--default");
//! ```
//!
//! `{% include %}` shares the including template's context, so it cannot
//! rebind `_self`; use `render()` when the nested template needs its own identity.

mod adapter;
mod cache;
mod config;
mod context;
mod engine;
mod error;
mod functions;
mod interceptor;
mod library;
mod names;
mod source;

pub use adapter::{Adapter, AdapterBuilder, RenderMeta};
pub use cache::{TemplateCache, TemplateOrigins};
pub use config::{AdapterConfig, LoaderMethod};
pub use context::{
    bind, defaults_deep, set_if_absent, CONFIG_KEY, ENV_KEY, INTERNAL_MARKER, SELF_KEY,
    TARGET_KEY,
};
pub use engine::{fractal_loader, fs_loader, MiniJinjaEngine, TemplateRenderer};
pub use error::RenderError;
pub use functions::{register_builtins, SubRenderer};
pub use interceptor::RenderInterceptor;
pub use library::{ComponentLibrary, CONFIG_SUFFIX, WRAPPER_MARKER};
pub use names::{bare_handle, is_handle, prefixed_handle, relative_path};
pub use source::{
    Component, ComponentSource, Entity, EntitySource, Listener, SourceContexts, SourceEvent,
    SubscriptionId, Variant, View, ViewKind, ViewRef, ViewSource, DEFAULT_VARIANT,
    VARIANT_SEPARATOR,
};

pub use mosaic_include::{IncludeError, DEFAULT_HANDLE_PREFIX};
