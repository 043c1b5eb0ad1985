//! Include directive parsing.
//!
//! A directive is any context key starting with [`DIRECTIVE_PREFIX`] whose value
//! is a comma-separated list of include expressions:
//!
//! ```text
//! expr_list := expr ("," expr)*
//! expr      := "..."? ref "!"? (" as " ident)?
//! ref       := entity_name ("." path_segment)*
//! ```
//!
//! - `...` spreads the addressed mapping's properties into the destination.
//! - `!` lets included values replace data already present.
//! - `as name` stores the value under `name`; a renamed include is never spread.
//!
//! The markers are checked in a fixed order (spread prefix, override suffix,
//! rename), so `a.b as x!` overrides while `a.b! as x` reads a property named `b!`.

use crate::error::{IncludeError, Result};

/// Key prefix that marks a context entry as an include directive.
pub const DIRECTIVE_PREFIX: &str = "include";

const SPREAD_MARKER: &str = "...";
const OVERRIDE_MARKER: char = '!';
const RENAME_SEPARATOR: &str = " as ";

/// Returns true if `key` names an include directive (`include`, `includes`, `includeCard`, ...).
pub fn is_directive_key(key: &str) -> bool {
    key.starts_with(DIRECTIVE_PREFIX)
}

/// One parsed include expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// The reference as written, without markers or rename (`card.meta`).
    pub source_ref: String,
    /// The entity part of the reference (`card`).
    pub context_name: String,
    /// Everything after the first `.`, if any (`meta`).
    pub path: Option<String>,
    /// Final segment of the reference, the default destination key.
    pub last_part: Option<String>,
    /// Place every property of the addressed mapping individually.
    pub spread: bool,
    /// Replace values already present in the destination.
    pub overrides: bool,
    /// Explicit destination key.
    pub rename: Option<String>,
}

impl IncludeDirective {
    /// Parses a single include expression.
    ///
    /// # Errors
    ///
    /// [`IncludeError::MissingDestination`] for a non-spread reference to a
    /// whole entity (`card`) without a rename, since such a value has no key
    /// to be stored under.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mosaic_include::IncludeDirective;
    ///
    /// let d = IncludeDirective::parse(" title.text as heading! ").unwrap();
    /// assert_eq!(d.context_name, "title");
    /// assert_eq!(d.path.as_deref(), Some("text"));
    /// assert_eq!(d.destination(), Some("heading"));
    /// assert!(d.overrides);
    /// assert!(!d.spread);
    /// ```
    pub fn parse(expression: &str) -> Result<Self> {
        let mut expr = expression.trim();

        let mut spread = false;
        if let Some(rest) = expr.strip_prefix(SPREAD_MARKER) {
            spread = true;
            expr = rest;
        }

        let mut overrides = false;
        if let Some(rest) = expr.strip_suffix(OVERRIDE_MARKER) {
            overrides = true;
            expr = rest;
        }

        let (source_ref, rename) = match expr.split_once(RENAME_SEPARATOR) {
            Some((source_ref, rename)) => {
                spread = false;
                (source_ref, Some(rename.to_string()))
            }
            None => (expr, None),
        };

        let (context_name, path, last_part) = match source_ref.split_once('.') {
            Some((name, path)) => {
                let last = source_ref.rsplit('.').next().unwrap_or(path);
                (name, Some(path.to_string()), Some(last.to_string()))
            }
            None => (source_ref, None, None),
        };

        if !spread && rename.is_none() && path.is_none() {
            return Err(IncludeError::MissingDestination {
                expression: expression.trim().to_string(),
            });
        }

        Ok(Self {
            source_ref: source_ref.to_string(),
            context_name: context_name.to_string(),
            path,
            last_part,
            spread,
            overrides,
            rename,
        })
    }

    /// The key a non-spread include is stored under: the rename, else the last path segment.
    pub fn destination(&self) -> Option<&str> {
        self.rename.as_deref().or(self.last_part.as_deref())
    }
}

/// Parses a directive value into its expressions, left to right.
///
/// Empty entries (a trailing comma) are ignored.
pub fn parse_directive_list(value: &str) -> Result<Vec<IncludeDirective>> {
    value
        .split(',')
        .filter(|expr| !expr.trim().is_empty())
        .map(IncludeDirective::parse)
        .collect()
}
