//! Application identifier inference
//!
//! OBB expansion files follow the naming convention
//! `<main|patch>.<version>.<package name>.obb`, so the package name of the
//! application that owns an OBB can be recovered from the filename alone.
//! This module is the only place where that derivation happens.
//!
//! ```text
//! main . 12345 . com . example . game . obb
//!  ^       ^     \________________/     ^
//! marker version     identifier      extension
//! ```
//!
//! The archive's own metadata is never consulted. A blob whose name does not
//! follow the convention cannot be routed and is rejected.

use std::fmt;
use thiserror::Error;

/// Tokens that mark the role of an expansion file.
pub const MARKER_TOKENS: &[&str] = &["main", "patch"];

/// Smallest token count that can hold marker, version, identifier and extension.
pub const MIN_TOKENS: usize = 4;

/// Reasons a filename cannot be turned into an application identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// The filename splits into fewer than four `.`-separated tokens
    #[error("filename has {found} dot-separated tokens, at least {MIN_TOKENS} required")]
    TooFewTokens { found: usize },

    /// No token equals `main` or `patch`
    #[error("filename has no 'main' or 'patch' marker token")]
    NoMarkerToken,

    /// Nothing is left between the version token and the extension
    #[error("no identifier tokens between the version and the extension")]
    EmptyIdentifier,

    /// The extracted identifier is not a usable dot-delimited name
    #[error("'{candidate}' is not a valid application identifier")]
    InvalidIdentifier { candidate: String },
}

/// A reverse-domain style application identifier such as `com.example.game`.
///
/// Every component is non-empty and free of path separators, so the
/// identifier can be used directly as a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationIdentifier(String);

impl ApplicationIdentifier {
    /// Validate `candidate` against the identifier invariant.
    pub fn new(candidate: impl Into<String>) -> Result<Self, InferenceError> {
        let candidate = candidate.into();
        let valid = !candidate.is_empty()
            && candidate
                .split('.')
                .all(|part| !part.is_empty() && !part.contains(['/', '\\']));
        if valid {
            Ok(Self(candidate))
        } else {
            Err(InferenceError::InvalidIdentifier { candidate })
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dot-separated components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for ApplicationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ApplicationIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Infer the owning application's identifier from an OBB filename.
///
/// The first `main` or `patch` token anchors the extraction; the token after
/// it (the version) and the last token (the extension) are discarded. A
/// single remaining token is accepted as a one-component identifier.
///
/// # Errors
///
/// - `TooFewTokens` for fewer than four tokens
/// - `NoMarkerToken` if neither marker is present
/// - `EmptyIdentifier` if no tokens remain after slicing
/// - `InvalidIdentifier` if the remaining tokens contain empty or path-like parts
pub fn infer(filename: &str) -> Result<ApplicationIdentifier, InferenceError> {
    let tokens: Vec<&str> = filename.split('.').collect();
    if tokens.len() < MIN_TOKENS {
        return Err(InferenceError::TooFewTokens {
            found: tokens.len(),
        });
    }

    let marker = tokens
        .iter()
        .position(|token| MARKER_TOKENS.contains(token))
        .ok_or(InferenceError::NoMarkerToken)?;

    let start = marker + 2;
    let end = tokens.len() - 1;
    if start >= end {
        return Err(InferenceError::EmptyIdentifier);
    }

    ApplicationIdentifier::new(tokens[start..end].join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inferred(name: &str) -> String {
        infer(name).expect("should infer").to_string()
    }

    #[test]
    fn test_main_obb() {
        assert_eq!(inferred("main.12345.com.example.game.obb"), "com.example.game");
    }

    #[test]
    fn test_patch_obb() {
        assert_eq!(inferred("patch.7.foo.bar.baz.obb"), "foo.bar.baz");
    }

    #[test]
    fn test_single_token_identifier_is_accepted() {
        assert_eq!(inferred("main.1.x.obb"), "x");
        assert_eq!(inferred("main.1.foo.dat"), "foo");

        let id = infer("main.1.x.obb").unwrap();
        assert_eq!(id.components().count(), 1);
    }

    #[test]
    fn test_no_marker() {
        // The token count is checked before the marker scan
        assert_eq!(
            infer("randomfile.obb"),
            Err(InferenceError::TooFewTokens { found: 2 })
        );
        assert_eq!(
            infer("some.random.file.name.obb"),
            Err(InferenceError::NoMarkerToken)
        );
    }

    #[test]
    fn test_too_few_tokens() {
        assert_eq!(infer("a.b.c"), Err(InferenceError::TooFewTokens { found: 3 }));
        assert_eq!(infer(""), Err(InferenceError::TooFewTokens { found: 1 }));
    }

    #[test]
    fn test_marker_match_is_exact() {
        assert_eq!(
            infer("Main.1.com.example.obb"),
            Err(InferenceError::NoMarkerToken)
        );
        assert_eq!(
            infer("mainly.1.com.example.obb"),
            Err(InferenceError::NoMarkerToken)
        );
    }

    #[test]
    fn test_first_marker_wins() {
        assert_eq!(inferred("main.3.patch.app.obb"), "patch.app");
        assert_eq!(inferred("x.patch.9.main.app.obb"), "main.app");
    }

    #[test]
    fn test_marker_too_close_to_end() {
        assert_eq!(infer("a.b.c.main.obb"), Err(InferenceError::EmptyIdentifier));
        assert_eq!(infer("a.b.main.1.obb"), Err(InferenceError::EmptyIdentifier));
        assert_eq!(infer("a.b.c.main"), Err(InferenceError::EmptyIdentifier));
    }

    #[test]
    fn test_empty_components_are_invalid() {
        assert!(matches!(
            infer("main.1..obb"),
            Err(InferenceError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            infer("main.1.com..game.obb"),
            Err(InferenceError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_path_separators_are_invalid() {
        assert!(matches!(
            infer("main.1.com/evil.game.obb"),
            Err(InferenceError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            infer("main.1.com\\evil.game.obb"),
            Err(InferenceError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_identifier_new_validates() {
        assert!(ApplicationIdentifier::new("com.example").is_ok());
        assert!(ApplicationIdentifier::new("").is_err());
        assert!(ApplicationIdentifier::new(".com").is_err());
        assert!(ApplicationIdentifier::new("com.").is_err());
    }

    #[test]
    fn test_error_display() {
        let msg = InferenceError::TooFewTokens { found: 3 }.to_string();
        assert!(msg.contains("3"));
        assert!(msg.contains("at least 4"));
    }
}
