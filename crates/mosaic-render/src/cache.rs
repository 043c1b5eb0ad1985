//! Compiled-template cache with explicit invalidation.
//!
//! MiniJinja keeps every template its loader returns for the lifetime of the
//! environment. [`TemplateCache`] owns the environment and is the only thing
//! that ever drops a compiled template: renders take a cheap snapshot of the
//! current environment, and puts or evictions replace it copy-on-write.
//!
//! Every cached name is indexed in [`TemplateOrigins`] together with the
//! source-relative path of the view it was compiled from. Evicting a view
//! drops its handle-keyed and path-keyed names plus any other name compiled
//! from the same file, and nothing else.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use minijinja::Environment;

use crate::error::RenderError;
use crate::names::{prefixed_handle, relative_path};
use crate::source::SourceEvent;

/// Index of cached template names to the relative path they were compiled from.
///
/// Shared between the cache and the loader, which records every template it
/// resolves.
#[derive(Debug, Clone, Default)]
pub struct TemplateOrigins(Arc<Mutex<HashMap<String, String>>>);

impl TemplateOrigins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `name` was compiled from `origin`.
    pub fn record(&self, name: &str, origin: &str) {
        self.lock().insert(name.to_string(), origin.to_string());
    }

    /// The origin recorded for `name`.
    pub fn origin(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    /// Cached names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every name keyed as `keys` or compiled from `path`.
    fn take(&self, keys: &[&str], path: &str) -> BTreeSet<String> {
        let mut index = self.lock();
        let names: BTreeSet<String> = index
            .iter()
            .filter(|(name, origin)| keys.contains(&name.as_str()) || origin.as_str() == path)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            index.remove(name);
        }
        names
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner of the MiniJinja environment and of its compiled templates.
pub struct TemplateCache {
    env: RwLock<Arc<Environment<'static>>>,
    origins: TemplateOrigins,
}

impl TemplateCache {
    /// Wraps a configured environment. `origins` must be the index its loader records into.
    pub fn new(env: Environment<'static>, origins: TemplateOrigins) -> Self {
        Self {
            env: RwLock::new(Arc::new(env)),
            origins,
        }
    }

    /// The current environment. Later puts and evictions do not affect it.
    pub fn snapshot(&self) -> Arc<Environment<'static>> {
        Arc::clone(&self.env.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The name index.
    pub fn origins(&self) -> &TemplateOrigins {
        &self.origins
    }

    /// Compiles `body` under `name`, replacing any cached template of that name.
    ///
    /// `origin` is the relative path the body belongs to; it defaults to `name`.
    pub fn put(&self, name: &str, body: &str, origin: Option<&str>) -> Result<(), RenderError> {
        {
            let mut env = self.env.write().unwrap_or_else(PoisonError::into_inner);
            Arc::make_mut(&mut env).add_template_owned(name.to_string(), body.to_string())?;
        }
        self.origins.record(name, origin.unwrap_or(name));
        tracing::debug!(name, "cached template body");
        Ok(())
    }

    /// Evicts the templates of one view.
    ///
    /// Drops the handle-keyed name (if any), the path-keyed name, and every
    /// name compiled from `path`. Returns how many cached names were dropped;
    /// evicting names that are not cached is a no-op.
    pub fn evict(&self, handle: Option<&str>, path: &str) -> usize {
        let mut keys = vec![path];
        keys.extend(handle);
        let names = self.origins.take(&keys, path);

        let mut env = self.env.write().unwrap_or_else(PoisonError::into_inner);
        let env = Arc::make_mut(&mut env);
        for name in keys.iter().copied().chain(names.iter().map(String::as_str)) {
            env.remove_template(name);
        }
        tracing::debug!(?handle, path, evicted = names.len(), "evicted templates");
        names.len()
    }

    /// Drops every compiled template.
    pub fn clear(&self) {
        {
            let mut env = self.env.write().unwrap_or_else(PoisonError::into_inner);
            Arc::make_mut(&mut env).clear_templates();
        }
        self.origins.clear();
        tracing::debug!("cleared template cache");
    }

    /// Applies a source event: evicts the event's view if the event makes it stale.
    pub fn invalidate(&self, event: &SourceEvent, root: &Path, handle_prefix: &str) -> usize {
        if !event.invalidates_cache() {
            return 0;
        }
        let view = event.view();
        let path = relative_path(root, view.path());
        let handle = view.handle().map(|h| prefixed_handle(h, handle_prefix));
        self.evict(handle.as_deref(), &path)
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("templates", &self.origins.names())
            .finish()
    }
}
