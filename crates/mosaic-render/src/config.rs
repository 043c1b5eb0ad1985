//! Adapter configuration.
//!
//! Options are read with camelCase keys so a library's existing YAML
//! configuration can be loaded as-is:
//!
//! ```yaml
//! method: fractal
//! handlePrefix: "@"
//! importContext: true
//! supportIncludesInTheContextData: true
//! ```
//!
//! Every option has a default; an empty document is a valid configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// How template names are resolved to views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderMethod {
    /// Handles and library-relative paths, resolved through the component source.
    #[default]
    Fractal,
    /// Plain filesystem paths under `base`, with optional `@namespace/` roots.
    Fs,
}

/// Options controlling the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterConfig {
    /// Template resolution strategy.
    pub method: LoaderMethod,

    /// Skip all context augmentation; contexts reach templates untouched.
    pub pristine: bool,

    /// Prefix marking a template name as an entity handle.
    pub handle_prefix: String,

    /// Fill each render's context with the rendered entity's own context.
    pub import_context: bool,

    /// Resolve include directives found in render contexts.
    pub support_includes_in_the_context_data: bool,

    /// Root directory for the `fs` loader. Defaults to the source root.
    pub base: Option<PathBuf>,

    /// Fail on undefined variables instead of rendering them empty.
    #[serde(rename = "strict_variables")]
    pub strict_variables: bool,

    /// Namespace roots for the `fs` loader (`@ns/path.jinja`).
    pub namespaces: BTreeMap<String, PathBuf>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            method: LoaderMethod::Fractal,
            pristine: false,
            handle_prefix: mosaic_include::DEFAULT_HANDLE_PREFIX.to_string(),
            import_context: false,
            support_includes_in_the_context_data: false,
            base: None,
            strict_variables: false,
            namespaces: BTreeMap::new(),
        }
    }
}

impl AdapterConfig {
    /// Parses a configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self, RenderError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Whether contexts are augmented at all.
    pub fn augments_context(&self) -> bool {
        !self.pristine
    }
}
