//! Error types for field declaration

use std::path::PathBuf;
use thiserror::Error;

/// Result type for field declaration operations
pub type Result<T> = std::result::Result<T, FieldError>;

/// Errors raised while declaring or loading fields.
///
/// Every variant is produced synchronously, at declaration time. Nothing here
/// is retried or recovered from internally.
#[derive(Debug, Error)]
pub enum FieldError {
    /// A choice set with no options
    #[error("choice requires at least one option")]
    EmptyChoiceSet,

    /// Default not found among the choices
    #[error("invalid default {default}: {reason}")]
    InvalidDefault { default: String, reason: String },

    /// Both a default key and a default factory were supplied
    #[error("can't pass both a default and a default factory")]
    ConflictingDefaultSpecification,

    /// The default factory matches more than one subgroup
    #[error("ambiguous default: {factory} matches more than one subgroup {keys:?}")]
    AmbiguousDefaultFactory { factory: String, keys: Vec<String> },

    /// A subgroup entry that is not a record type
    #[error("all subgroup values must be record types, but '{key}' maps to {type_name}")]
    InvalidSubgroupValue { key: String, type_name: String },

    /// A flag action combined with an incompatible default
    #[error("default should either not be passed or set to {expected} when using the {action} action")]
    InvalidFlagDefault { action: String, expected: bool },

    /// Two fields share a name
    #[error("duplicate field name: {name}")]
    DuplicateField { name: String },

    /// A manifest entry that can't be turned into a field
    #[error("malformed declaration: {message}")]
    Malformed { message: String },

    /// A command-line value that doesn't fit the field
    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    /// Wraps any of the above with the name of the offending field
    #[error("field '{field}': {source}")]
    Declaration {
        field: String,
        source: Box<FieldError>,
    },

    /// Manifest file with an extension other than `.toml`
    #[error("unsupported file format for {path}: only .toml is supported")]
    UnsupportedFormat { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FieldError {
    pub(crate) fn invalid_default(default: impl std::fmt::Debug, reason: impl Into<String>) -> Self {
        FieldError::InvalidDefault {
            default: format!("{default:?}"),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        FieldError::Malformed {
            message: message.into(),
        }
    }

    /// Attaches the field name, unless the error already carries one.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        match self {
            e @ FieldError::Declaration { .. } => e,
            e => FieldError::Declaration {
                field: field.into(),
                source: Box::new(e),
            },
        }
    }

    /// The innermost error, looking through [`FieldError::Declaration`].
    pub fn root(&self) -> &FieldError {
        match self {
            FieldError::Declaration { source, .. } => source.root(),
            e => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FieldError::EmptyChoiceSet.to_string(),
            "choice requires at least one option"
        );
        let err = FieldError::invalid_default("xl", "not one of the choices");
        assert_eq!(err.to_string(), "invalid default \"xl\": not one of the choices");
    }

    #[test]
    fn test_in_field_names_the_field() {
        let err = FieldError::ConflictingDefaultSpecification.in_field("model");
        assert_eq!(
            err.to_string(),
            "field 'model': can't pass both a default and a default factory"
        );
        assert!(matches!(
            err.root(),
            FieldError::ConflictingDefaultSpecification
        ));
    }

    #[test]
    fn test_in_field_does_not_nest() {
        let err = FieldError::EmptyChoiceSet.in_field("a").in_field("b");
        assert_eq!(err.to_string(), "field 'a': choice requires at least one option");
    }

    #[test]
    fn test_ambiguous_lists_keys() {
        let err = FieldError::AmbiguousDefaultFactory {
            factory: "ResNet".into(),
            keys: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().contains("ResNet"));
        assert!(err.to_string().contains("[\"a\", \"b\"]"));
    }
}
