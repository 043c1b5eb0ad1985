//! Identity-scoped rendering.
//!
//! [`RenderInterceptor`] decorates a [`TemplateRenderer`]. Before every render
//! it rewrites the context for the entity the template belongs to, worked out
//! from the template name alone:
//!
//! 1. Pristine configurations pass through untouched and the remaining steps
//!    are skipped.
//! 2. With `importContext`, the handle comes from the name itself (`@card`) or
//!    from the view stored at the name's path (`cards/card.jinja`).
//! 3. With `importContext`, that handle is looked up and resolved to its
//!    default variant.
//! 4. With `importContext`, the variant's context is filled in underneath the
//!    caller's values and `_self` is bound to the variant. A template with no
//!    entity skips this step.
//! 5. With `supportIncludesInTheContextData`, include directives are resolved,
//!    whether or not an entity was found.
//! 6. The engine's key enumeration needs no rebuilding: MiniJinja reads a
//!    mapping's keys from the context itself, so nothing is added to the tree.
//! 7. The wrapped renderer renders the rewritten context.
//!
//! Steps 2 to 4 run only with `importContext`. Without it no lookup is made.
//!
//! Nothing is remembered between calls, so a nested render always scopes to
//! its own template and never inherits the caller's identity.

use std::sync::Arc;

use mosaic_include::resolve_includes;
use serde_json::Value;

use crate::config::AdapterConfig;
use crate::context::{bind, defaults_deep, SELF_KEY};
use crate::engine::TemplateRenderer;
use crate::error::RenderError;
use crate::names::{bare_handle, is_handle};
use crate::source::{ComponentSource, EntitySource, SourceContexts, ViewSource};

/// A [`TemplateRenderer`] that scopes each render to the entity being rendered.
pub struct RenderInterceptor<R> {
    inner: R,
    source: Arc<dyn ComponentSource>,
    config: Arc<AdapterConfig>,
}

impl<R: TemplateRenderer> RenderInterceptor<R> {
    pub fn new(inner: R, source: Arc<dyn ComponentSource>, config: Arc<AdapterConfig>) -> Self {
        Self {
            inner,
            source,
            config,
        }
    }

    /// The wrapped renderer.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Bare handle of the entity rendered by template `name`, if any.
    pub fn rendered_handle(&self, name: &str) -> Option<String> {
        let prefix = &self.config.handle_prefix;
        if is_handle(name, prefix) {
            return Some(bare_handle(name, prefix).to_string());
        }
        self.source
            .find_view_by_path(&self.source.root().join(name))
            .map(|view| view.handle)
    }

    /// Rewrites `context` for a render of template `name`.
    pub fn scope(&self, name: &str, mut context: Value) -> Result<Value, RenderError> {
        if self.config.pristine {
            return Ok(context);
        }
        let prefix = &self.config.handle_prefix;

        if self.config.import_context {
            let entity = self
                .rendered_handle(name)
                .and_then(|handle| self.source.find(&handle));
            match entity {
                Some(entity) => {
                    let variant = entity.into_default_variant();
                    defaults_deep(&mut context, &variant.context);
                    bind(&mut context, SELF_KEY, variant.to_json()?);
                    tracing::debug!(template = name, handle = %variant.handle, "bound render identity");
                }
                None => tracing::trace!(template = name, "no entity for template"),
            }
        }

        if self.config.support_includes_in_the_context_data {
            let lookup = SourceContexts::new(&*self.source, prefix);
            resolve_includes(&mut context, &lookup, prefix)?;
        }

        Ok(context)
    }
}

impl<R: TemplateRenderer> TemplateRenderer for RenderInterceptor<R> {
    fn render(&self, name: &str, context: Value) -> Result<String, RenderError> {
        let context = self.scope(name, context)?;
        self.inner.render(name, context)
    }
}
