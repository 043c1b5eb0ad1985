//! Error types for include resolution.

use thiserror::Error;

/// Errors raised while resolving include directives in a context tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncludeError {
    /// A directive references an entity the source does not know.
    #[error("sub-render item {id} not found")]
    EntityNotFound { id: String },

    /// Expanding a directive led back to a source that is still being expanded.
    #[error("cyclic include: {}", chain.join(" -> "))]
    CyclicInclude { chain: Vec<String> },

    /// A non-spread include of a whole entity context without `as <name>`.
    #[error("include '{expression}' places a whole context and needs a name ('{expression} as <name>')")]
    MissingDestination { expression: String },

    /// Path addressing stepped through a missing or null value.
    #[error("cannot read '{segment}' of a missing value while addressing '{path}'")]
    PathNotFound { path: String, segment: String },
}

/// Result type for include operations.
pub type Result<T> = std::result::Result<T, IncludeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_include_lists_the_chain() {
        let err = IncludeError::CyclicInclude {
            chain: vec!["@a.x".into(), "@b.y".into(), "@a.x".into()],
        };
        assert_eq!(err.to_string(), "cyclic include: @a.x -> @b.y -> @a.x");
    }

    #[test]
    fn entity_not_found_names_the_id() {
        let err = IncludeError::EntityNotFound { id: "@card".into() };
        assert!(err.to_string().contains("@card"));
    }
}
