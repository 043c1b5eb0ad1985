//! Error types for rendering.
//!
//! [`RenderError`] is the error of every public rendering operation. Engine
//! failures keep the underlying `minijinja::Error` as their source; errors
//! raised by nested `render()` calls inside a template are recovered as their
//! typed variant instead of a generic engine error.

use mosaic_include::IncludeError;
use thiserror::Error;

/// Error type for rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An include directive or sub-render references an unknown entity.
    #[error("sub-render item {0} not found")]
    EntityNotFound(String),

    /// The loader has no view for the requested location.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The template engine failed while compiling or executing a template.
    #[error("template error: {0}")]
    Engine(#[source] minijinja::Error),

    /// Include resolution failed (cycle, malformed directive, broken path).
    #[error(transparent)]
    Include(IncludeError),

    /// The render context is not a mapping.
    #[error("invalid render context: {0}")]
    InvalidContext(String),

    /// Configuration or component config file could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// I/O error while loading a library from disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Template data could not be converted.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<IncludeError> for RenderError {
    fn from(err: IncludeError) -> Self {
        match err {
            IncludeError::EntityNotFound { id } => RenderError::EntityNotFound(id),
            other => RenderError::Include(other),
        }
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        if let Some(cause) = typed_cause(&err) {
            return cause;
        }
        match err.kind() {
            minijinja::ErrorKind::TemplateNotFound => {
                let name = err
                    .detail()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                RenderError::TemplateNotFound(name)
            }
            _ => RenderError::Engine(err),
        }
    }
}

/// Finds a typed error raised by a nested render somewhere in the source chain.
fn typed_cause(err: &minijinja::Error) -> Option<RenderError> {
    let mut cause = std::error::Error::source(err);
    while let Some(current) = cause {
        if let Some(render_err) = current.downcast_ref::<RenderError>() {
            match render_err {
                RenderError::EntityNotFound(id) => {
                    return Some(RenderError::EntityNotFound(id.clone()))
                }
                RenderError::TemplateNotFound(name) => {
                    return Some(RenderError::TemplateNotFound(name.clone()))
                }
                RenderError::Include(include) => return Some(RenderError::Include(include.clone())),
                _ => {}
            }
        }
        cause = current.source();
    }
    None
}
