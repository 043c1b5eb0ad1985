//! The component-library adapter.
//!
//! [`Adapter`] ties the pieces together: a [`ComponentSource`], a
//! [`TemplateCache`] kept fresh by the source's change events, the MiniJinja
//! engine wrapped in a [`RenderInterceptor`], and the built-in `render()`
//! function for identity-scoped sub-renders.
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use mosaic_render::{Adapter, AdapterConfig, Component, ComponentLibrary, EntitySource, RenderMeta};
//! use serde_json::json;
//!
//! let library = Arc::new(ComponentLibrary::new("ui", "/lib"));
//! library.add_component(
//!     Component::new("button").with_context(json!({"label": "Go"})),
//!     "<button>{{ label }}</button>",
//! );
//!
//! let adapter = Adapter::builder(library.clone())
//!     .config(AdapterConfig { import_context: true, ..AdapterConfig::default() })
//!     .build();
//!
//! let button = library.find("button").unwrap();
//! let html = adapter
//!     .render(Path::new("/lib/button.jinja"), None, json!({}), &RenderMeta::new().with_entity(button))
//!     .unwrap();
//! assert_eq!(html, "<button>Go</button>");
//! ```

use std::path::Path;
use std::sync::{Arc, Weak};

use minijinja::{Environment, UndefinedBehavior};
use mosaic_include::normalize_id;
use serde_json::{Map, Value};

use crate::cache::{TemplateCache, TemplateOrigins};
use crate::config::{AdapterConfig, LoaderMethod};
use crate::context::{defaults_deep, set_if_absent, CONFIG_KEY, ENV_KEY, SELF_KEY, TARGET_KEY};
use crate::engine::{fractal_loader, fs_loader, MiniJinjaEngine, TemplateRenderer};
use crate::error::RenderError;
use crate::functions::{register_builtins, SubRenderer};
use crate::interceptor::RenderInterceptor;
use crate::names::{bare_handle, prefixed_handle, relative_path};
use crate::source::{ComponentSource, Entity, EntitySource, SubscriptionId, ViewSource};

/// Ambient values for one render.
#[derive(Debug, Clone, Default)]
pub struct RenderMeta {
    /// The entity being rendered, seeded as `_self`.
    pub entity: Option<Entity>,
    /// Seeded as `_target`.
    pub target: Option<Value>,
    /// Seeded as `_env`.
    pub env: Option<Value>,
}

impl RenderMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_target(mut self, target: Value) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_env(mut self, env: Value) -> Self {
        self.env = Some(env);
        self
    }
}

/// Builder for [`Adapter`].
///
/// Custom functions, filters and tests are registered directly on the
/// MiniJinja environment through [`environment_mut`](Self::environment_mut)
/// or [`configure`](Self::configure).
pub struct AdapterBuilder {
    source: Arc<dyn ComponentSource>,
    config: AdapterConfig,
    env: Environment<'static>,
    app_config: Value,
}

impl AdapterBuilder {
    pub fn new(source: Arc<dyn ComponentSource>) -> Self {
        Self {
            source,
            config: AdapterConfig::default(),
            env: Environment::new(),
            app_config: Value::Object(Map::new()),
        }
    }

    /// Sets the adapter options.
    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the application configuration exposed to templates as `_config`.
    pub fn app_config(mut self, app_config: Value) -> Self {
        self.app_config = app_config;
        self
    }

    /// The environment templates will be rendered with.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    /// Applies `f` to the environment.
    pub fn configure(mut self, f: impl FnOnce(&mut Environment<'static>)) -> Self {
        f(&mut self.env);
        self
    }

    /// Installs the loader, the built-in functions and the cache invalidation listener.
    pub fn build(self) -> Adapter {
        let AdapterBuilder {
            source,
            config,
            mut env,
            app_config,
        } = self;
        let config = Arc::new(config);
        let origins = TemplateOrigins::new();

        match config.method {
            LoaderMethod::Fractal => env.set_loader(fractal_loader(
                Arc::clone(&source),
                config.handle_prefix.clone(),
                origins.clone(),
            )),
            LoaderMethod::Fs => {
                let root = source.root().to_path_buf();
                let base = config
                    .base
                    .as_ref()
                    .map(|base| root.join(base))
                    .unwrap_or_else(|| root.clone());
                env.set_loader(fs_loader(base, config.namespaces.clone(), root, origins.clone()));
            }
        }
        if config.strict_variables {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }

        let core = Arc::new_cyclic(|core: &Weak<AdapterCore>| {
            if !config.pristine {
                let renderer: Weak<dyn SubRenderer> = core.clone();
                register_builtins(&mut env, renderer);
            }
            let cache = Arc::new(TemplateCache::new(env, origins));
            let engine = MiniJinjaEngine::new(Arc::clone(&cache));
            AdapterCore {
                interceptor: RenderInterceptor::new(engine, Arc::clone(&source), Arc::clone(&config)),
                cache,
                source: Arc::clone(&source),
                config: Arc::clone(&config),
                app_config,
            }
        });

        let cache = Arc::downgrade(&core.cache);
        let root = source.root().to_path_buf();
        let prefix = config.handle_prefix.clone();
        let subscription = source.subscribe(Box::new(move |event| {
            if let Some(cache) = cache.upgrade() {
                cache.invalidate(event, &root, &prefix);
            }
        }));
        tracing::debug!(loader = %format!("mosaic-{}", source.name()), method = ?config.method, "adapter ready");

        Adapter { core, subscription }
    }
}

/// Renders a component library's templates with MiniJinja.
///
/// Dropping the adapter unsubscribes it from the source.
pub struct Adapter {
    core: Arc<AdapterCore>,
    subscription: SubscriptionId,
}

impl Adapter {
    /// Starts building an adapter over `source`.
    pub fn builder(source: Arc<dyn ComponentSource>) -> AdapterBuilder {
        AdapterBuilder::new(source)
    }

    /// Renders the template at `path`.
    ///
    /// When `body` is given it is compiled and cached under the template's
    /// name first, replacing any earlier compilation. `context` must be a
    /// mapping or null. Ambient keys from `meta` are seeded only where the
    /// context has none, and never in pristine mode.
    pub fn render(
        &self,
        path: &Path,
        body: Option<&str>,
        context: Value,
        meta: &RenderMeta,
    ) -> Result<String, RenderError> {
        self.core.render(path, body, context, meta)
    }

    /// Renders an entity by handle, as the `render()` template function does.
    pub fn render_entity(
        &self,
        handle: &str,
        context: Option<Value>,
        merge: bool,
    ) -> Result<String, RenderError> {
        self.core.render_entity(handle, context, merge)
    }

    /// The compiled-template cache.
    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.core.cache
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.core.config
    }

    /// Name of the template loader (`mosaic-<source name>`).
    pub fn loader_name(&self) -> String {
        format!("mosaic-{}", self.core.source.name())
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        self.core.source.unsubscribe(self.subscription);
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("loader", &self.loader_name())
            .field("config", &self.core.config)
            .field("cache", &self.core.cache)
            .finish()
    }
}

struct AdapterCore {
    interceptor: RenderInterceptor<MiniJinjaEngine>,
    cache: Arc<TemplateCache>,
    source: Arc<dyn ComponentSource>,
    config: Arc<AdapterConfig>,
    app_config: Value,
}

impl AdapterCore {
    fn render(
        &self,
        path: &Path,
        body: Option<&str>,
        context: Value,
        meta: &RenderMeta,
    ) -> Result<String, RenderError> {
        let mut context = mapping(context)?;
        if self.config.augments_context() {
            let entity = meta.entity.as_ref().map(Entity::to_json).transpose()?;
            set_if_absent(&mut context, SELF_KEY, entity);
            set_if_absent(&mut context, TARGET_KEY, meta.target.clone());
            set_if_absent(&mut context, ENV_KEY, meta.env.clone());
            set_if_absent(&mut context, CONFIG_KEY, Some(self.app_config.clone()));
        }

        let name = self.template_name(path, meta.entity.as_ref());
        if let Some(body) = body {
            let origin = relative_path(self.source.root(), path);
            self.cache.put(&name, body, Some(&origin))?;
        }
        tracing::debug!(template = %name, path = %path.display(), "rendering");
        self.interceptor.render(&name, context)
    }

    fn template_name(&self, path: &Path, entity: Option<&Entity>) -> String {
        match (self.config.method, entity) {
            (LoaderMethod::Fractal, Some(entity)) => {
                prefixed_handle(entity.handle(), &self.config.handle_prefix)
            }
            (LoaderMethod::Fractal, None) => relative_path(self.source.root(), path),
            (LoaderMethod::Fs, _) => path.to_string_lossy().into_owned(),
        }
    }
}

impl SubRenderer for AdapterCore {
    fn render_entity(
        &self,
        handle: &str,
        context: Option<Value>,
        merge: bool,
    ) -> Result<String, RenderError> {
        let prefix = &self.config.handle_prefix;
        let name = normalize_id(handle, prefix);
        let entity = self
            .source
            .find(bare_handle(&name, prefix))
            .ok_or_else(|| RenderError::EntityNotFound(name.clone()))?;
        let own = entity.into_default_variant().context;

        let context = match context {
            Some(mut given) => {
                if merge {
                    defaults_deep(&mut given, &own);
                }
                given
            }
            None => own,
        };
        tracing::debug!(handle = %name, merge, "sub-render");
        self.interceptor.render(&name, mapping(context)?)
    }
}

/// Accepts a mapping, treating null as an empty one.
fn mapping(context: Value) -> Result<Value, RenderError> {
    match context {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(context),
        other => Err(RenderError::InvalidContext(format!(
            "expected a mapping, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
