//! Template engine abstraction and the MiniJinja backend.
//!
//! [`TemplateRenderer`] is the render primitive the identity scoper wraps. The
//! default implementation, [`MiniJinjaEngine`], renders named templates out of
//! a [`TemplateCache`] snapshot. Templates reach the cache through one of two
//! loaders:
//!
//! - [`fractal_loader`]: handles (`@card`) and source-relative paths resolve
//!   through the component source.
//! - [`fs_loader`]: paths are read from disk under a base directory, with
//!   `@namespace/` prefixes mapped to their own directories.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{Error, ErrorKind};
use serde_json::Value;

use crate::cache::{TemplateCache, TemplateOrigins};
use crate::error::RenderError;
use crate::names::{bare_handle, is_handle, relative_path};
use crate::source::{ComponentSource, ViewSource};

/// Renders a named template with a context tree.
pub trait TemplateRenderer: Send + Sync {
    /// Renders the template registered or loadable under `name`.
    fn render(&self, name: &str, context: Value) -> Result<String, RenderError>;
}

/// MiniJinja-based renderer over a [`TemplateCache`].
#[derive(Debug, Clone)]
pub struct MiniJinjaEngine {
    cache: Arc<TemplateCache>,
}

impl MiniJinjaEngine {
    pub fn new(cache: Arc<TemplateCache>) -> Self {
        Self { cache }
    }

    /// The cache this engine renders from.
    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }
}

impl TemplateRenderer for MiniJinjaEngine {
    fn render(&self, name: &str, context: Value) -> Result<String, RenderError> {
        let env = self.cache.snapshot();
        let template = env.get_template(name)?;
        Ok(template.render(minijinja::Value::from_serialize(&context))?)
    }
}

/// Loader resolving template names through a component source.
///
/// A name starting with `handle_prefix` is looked up with
/// [`find_view`](crate::ViewSource::find_view); any other name is treated as a
/// path relative to the source root. Unknown names yield `Ok(None)`, which
/// MiniJinja reports as a missing template.
pub fn fractal_loader(
    source: Arc<dyn ComponentSource>,
    handle_prefix: String,
    origins: TemplateOrigins,
) -> impl Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static {
    move |name: &str| {
        let view = if is_handle(name, &handle_prefix) {
            source.find_view(bare_handle(name, &handle_prefix))
        } else {
            source.find_view_by_path(&source.root().join(name))
        };
        let Some(view) = view else {
            tracing::debug!(name, "no view for template");
            return Ok(None);
        };
        origins.record(name, &relative_path(source.root(), &view.path));
        tracing::debug!(name, path = %view.path.display(), "loaded view");
        Ok(Some(view.content))
    }
}

/// Loader reading templates from disk.
///
/// `@ns/rest` resolves to `rest` under the directory registered for `ns`;
/// everything else resolves under `base`. Relative namespace directories are
/// taken relative to `base`. Names with `..` segments are never loaded.
pub fn fs_loader(
    base: PathBuf,
    namespaces: BTreeMap<String, PathBuf>,
    root: PathBuf,
    origins: TemplateOrigins,
) -> impl Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static {
    move |name: &str| {
        let Some(path) = fs_path(&base, &namespaces, name) else {
            return Ok(None);
        };
        match fs::read_to_string(&path) {
            Ok(content) => {
                origins.record(name, &relative_path(&root, &path));
                tracing::debug!(name, path = %path.display(), "loaded template file");
                Ok(Some(content))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {}", path.display()),
            )
            .with_source(err)),
        }
    }
}

fn fs_path(base: &Path, namespaces: &BTreeMap<String, PathBuf>, name: &str) -> Option<PathBuf> {
    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }
    if let Some((namespace, rest)) = name.strip_prefix('@').and_then(|n| n.split_once('/')) {
        if let Some(dir) = namespaces.get(namespace) {
            return Some(base.join(dir).join(rest));
        }
    }
    Some(base.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ComponentLibrary;
    use crate::source::Component;
    use minijinja::Environment;
    use serde_json::json;

    fn library() -> Arc<ComponentLibrary> {
        let library = ComponentLibrary::new("ui", "/lib");
        library.add_component(Component::new("card"), "card {{ title }}");
        library.add_component(
            Component::new("button").with_view("atoms/button.jinja"),
            "button",
        );
        Arc::new(library)
    }

    fn engine(source: Arc<ComponentLibrary>) -> MiniJinjaEngine {
        let origins = TemplateOrigins::new();
        let mut env = Environment::new();
        env.set_loader(fractal_loader(source, "@".to_string(), origins.clone()));
        MiniJinjaEngine::new(Arc::new(TemplateCache::new(env, origins)))
    }

    #[test]
    fn renders_by_handle() {
        let engine = engine(library());
        let out = engine.render("@card", json!({"title": "Hi"})).unwrap();
        assert_eq!(out, "card Hi");
        assert_eq!(
            engine.cache().origins().origin("@card").as_deref(),
            Some("card.jinja")
        );
    }

    #[test]
    fn variant_handle_loads_component_view() {
        let engine = engine(library());
        assert_eq!(engine.render("@card--default", json!({})).unwrap(), "card ");
    }

    #[test]
    fn renders_by_relative_path() {
        let engine = engine(library());
        assert_eq!(engine.render("atoms/button.jinja", json!({})).unwrap(), "button");
        assert_eq!(
            engine.cache().origins().origin("atoms/button.jinja").as_deref(),
            Some("atoms/button.jinja")
        );
    }

    #[test]
    fn unknown_template_is_not_found() {
        let engine = engine(library());
        let err = engine.render("@missing", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(ref name) if name.contains("@missing")));
    }

    #[test]
    fn fs_paths() {
        let base = Path::new("/site");
        let mut namespaces = BTreeMap::new();
        namespaces.insert("ui".to_string(), PathBuf::from("components/ui"));
        namespaces.insert("abs".to_string(), PathBuf::from("/shared"));

        assert_eq!(fs_path(base, &namespaces, "page.jinja"), Some(PathBuf::from("/site/page.jinja")));
        assert_eq!(
            fs_path(base, &namespaces, "@ui/card.jinja"),
            Some(PathBuf::from("/site/components/ui/card.jinja"))
        );
        assert_eq!(
            fs_path(base, &namespaces, "@abs/card.jinja"),
            Some(PathBuf::from("/shared/card.jinja"))
        );
        assert_eq!(
            fs_path(base, &namespaces, "@other/card.jinja"),
            Some(PathBuf::from("/site/@other/card.jinja"))
        );
        assert_eq!(fs_path(base, &namespaces, "../secret"), None);
    }

    #[test]
    fn fs_loader_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.jinja"), "page {{ n }}").unwrap();

        let origins = TemplateOrigins::new();
        let mut env = Environment::new();
        env.set_loader(fs_loader(
            dir.path().to_path_buf(),
            BTreeMap::new(),
            dir.path().to_path_buf(),
            origins.clone(),
        ));
        let engine = MiniJinjaEngine::new(Arc::new(TemplateCache::new(env, origins)));

        assert_eq!(engine.render("page.jinja", json!({"n": 2})).unwrap(), "page 2");
        assert!(matches!(
            engine.render("missing.jinja", json!({})),
            Err(RenderError::TemplateNotFound(_))
        ));
    }
}
