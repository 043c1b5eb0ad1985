//! Built-in template functions.
//!
//! `render(handle, context=none, merge=false)` renders another entity from
//! inside a template. Arguments are positional:
//!
//! ```jinja
//! {{ render("@button") }}
//! {{ render("@button", {"label": "Save"}) }}
//! {{ render("@button", {"label": "Save"}, true) }}
//! ```
//!
//! Unlike `{% include %}`, which shares the caller's context, the nested
//! render goes back through the identity scoper with its own template name.

use std::sync::Weak;

use minijinja::{Environment, Error, ErrorKind, Value};

use crate::error::RenderError;

/// Renders an entity by handle on behalf of a template.
pub trait SubRenderer: Send + Sync {
    /// Renders `handle` with `context`, or with the entity's own context when
    /// none is given. With `merge`, the entity's context fills in whatever the
    /// given context lacks.
    fn render_entity(&self, handle: &str, context: Option<serde_json::Value>, merge: bool) -> Result<String, RenderError>;
}

/// Registers the built-in functions on `env`.
///
/// The renderer is held weakly; once it is dropped, `render()` fails.
pub fn register_builtins(env: &mut Environment<'static>, renderer: Weak<dyn SubRenderer>) {
    env.add_function(
        "render",
        move |handle: String, context: Option<Value>, merge: Option<bool>| -> Result<Value, Error> {
            let renderer = renderer.upgrade().ok_or_else(|| {
                Error::new(ErrorKind::InvalidOperation, "renderer is no longer available")
            })?;
            let context = context
                .filter(|value| !value.is_none() && !value.is_undefined())
                .map(|value| serde_json::to_value(&value))
                .transpose()
                .map_err(|err| {
                    Error::new(ErrorKind::InvalidOperation, "render() context is not serializable")
                        .with_source(err)
                })?;

            renderer
                .render_entity(&handle, context, merge.unwrap_or(false))
                .map(Value::from_safe_string)
                .map_err(|err| {
                    Error::new(ErrorKind::InvalidOperation, format!("render({handle}) failed"))
                        .with_source(err)
                })
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Echo(Mutex<Vec<(String, Option<serde_json::Value>, bool)>>);

    impl SubRenderer for Echo {
        fn render_entity(
            &self,
            handle: &str,
            context: Option<serde_json::Value>,
            merge: bool,
        ) -> Result<String, RenderError> {
            if handle == "@ghost" {
                return Err(RenderError::EntityNotFound(handle.to_string()));
            }
            self.0
                .lock()
                .unwrap()
                .push((handle.to_string(), context, merge));
            Ok(format!("<{handle}>"))
        }
    }

    fn env_with(echo: &Arc<Echo>) -> Environment<'static> {
        let mut env = Environment::new();
        let weak: Weak<dyn SubRenderer> = Arc::downgrade(echo) as Weak<dyn SubRenderer>;
        register_builtins(&mut env, weak);
        env
    }

    #[test]
    fn output_is_not_escaped() {
        let echo = Arc::new(Echo::default());
        let mut env = env_with(&echo);
        env.add_template("page.html", "{{ render('@button') }}").unwrap();
        let out = env.get_template("page.html").unwrap().render(()).unwrap();
        assert_eq!(out, "<@button>");
    }

    #[test]
    fn passes_context_and_merge() {
        let echo = Arc::new(Echo::default());
        let env = env_with(&echo);
        env.render_str("{{ render('@button', {'label': 'Save'}, true) }}", ())
            .unwrap();
        env.render_str("{{ render('@button', none) }}", ()).unwrap();
        let calls = echo.0.lock().unwrap();
        assert_eq!(
            calls[0],
            (
                "@button".to_string(),
                Some(serde_json::json!({"label": "Save"})),
                true
            )
        );
        assert_eq!(calls[1], ("@button".to_string(), None, false));
    }

    #[test]
    fn errors_keep_their_type() {
        let echo = Arc::new(Echo::default());
        let env = env_with(&echo);
        let err = env.render_str("{{ render('@ghost') }}", ()).unwrap_err();
        let err: RenderError = err.into();
        assert!(matches!(err, RenderError::EntityNotFound(ref id) if id == "@ghost"));
    }

    #[test]
    fn dropped_renderer_fails() {
        let echo = Arc::new(Echo::default());
        let env = env_with(&echo);
        drop(echo);
        let err = env.render_str("{{ render('@button') }}", ()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }
}
