//! Error types for the render pipeline.
//!
//! Errors are grouped by when they happen. [`ConfigError`] is raised while a
//! [`Parser`](crate::Parser) is being built. [`IdentityError`] is raised when a
//! document name cannot be formed. [`LoaderError`] is raised when template
//! source cannot be resolved. [`ContentError`] comes from the content store.
//! [`WikiError`] wraps all of them for render operations.

use std::error::Error as StdError;

use thiserror::Error;

use crate::content::ContentError;
use crate::template::TagError;

/// Top-level error returned by render operations.
#[derive(Debug, Error)]
pub enum WikiError {
    /// Invalid parser or extension configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A category or topic has no usable identity.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Template source could not be resolved.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Content text could not be read.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// A topic was rendered without a resolvable category.
    #[error("Topic '{topic}' has no category")]
    MissingCategory { topic: String },

    /// The template engine failed to compile or render.
    #[error("Template error: {0}")]
    Template(#[source] minijinja::Error),

    /// A custom tag could not be expanded.
    #[error(transparent)]
    Tag(#[from] TagError),

    /// A document was rendered from inside its own render.
    #[error("Render cycle: '{name}' is already being rendered")]
    RenderCycle { name: String },

    /// Nested renders went deeper than the parser allows.
    #[error("Render of '{name}' exceeds the nesting limit of {limit}")]
    RenderDepth { name: String, limit: usize },

    /// A markup tag produced an invalid pattern.
    #[error("Invalid markup pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<minijinja::Error> for WikiError {
    fn from(err: minijinja::Error) -> Self {
        // Include failures travel through the engine; surface the underlying
        // loader error instead of the wrapped template error.
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(loader) = cause.downcast_ref::<LoaderError>() {
                return WikiError::Loader(loader.clone());
            }
            match cause.downcast_ref::<WikiError>() {
                Some(WikiError::Loader(loader)) => return WikiError::Loader(loader.clone()),
                Some(WikiError::RenderCycle { name }) => {
                    return WikiError::RenderCycle { name: name.clone() }
                }
                Some(WikiError::RenderDepth { name, limit }) => {
                    return WikiError::RenderDepth {
                        name: name.clone(),
                        limit: *limit,
                    }
                }
                _ => {}
            }
            if let Some(tag) = cause.downcast_ref::<TagError>() {
                return WikiError::Tag(tag.clone());
            }
            source = cause.source();
        }
        WikiError::Template(err)
    }
}

/// Errors raised while building a parser or installing extensions.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The parser was built without a controller.
    #[error("No controller provided to the parser")]
    MissingController,

    /// The parser was built without a categories store.
    #[error("No categories model provided to the parser")]
    MissingCategories,

    /// An extension name has no registered factory.
    #[error("Unknown extension '{0}'")]
    UnknownExtension(String),

    /// An extension definition is neither a name nor a name-keyed options map.
    #[error("Invalid extension definition: {0}")]
    InvalidExtension(String),

    /// An extension rejected its options.
    #[error("Invalid options for extension '{extension}': {reason}")]
    InvalidOptions { extension: String, reason: String },

    /// A registration builder was finalized without a handler.
    #[error("No handler set for {kind} '{name}'")]
    MissingHandler { kind: &'static str, name: String },

    /// The template engine cannot install a registration.
    #[error("Template engine does not support {feature} ('{name}')")]
    Unsupported { feature: &'static str, name: String },

    /// The engine was used before a loader was attached.
    #[error("Template engine has no loader attached")]
    NoLoader,

    /// Failed to read a configuration file.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to parse JSON configuration.
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file has an unrecognized extension.
    #[error("Unsupported config format for '{0}' (expected .yaml, .yml or .json)")]
    UnknownFormat(String),
}

impl ConfigError {
    /// Create an invalid-options error for an extension.
    pub fn options(extension: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            extension: extension.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised when a document name cannot be computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("No ident found on category")]
    BlankCategory,

    #[error("No ident found on topic")]
    BlankTopic,

    #[error("Category ident '{0}' contains the name separator")]
    SeparatorInCategory(String),

    #[error("Topic '{0}' has no category")]
    NoCategory(String),
}

/// Errors raised while resolving template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    /// The category part of a compound name is not a known category.
    #[error("Invalid category specified in path: {0}")]
    UnknownCategory(String),

    /// The name has no category separator and no cached source.
    #[error("Malformed document name: {0}")]
    MalformedName(String),

    /// The include document could not be read.
    #[error("Failed to load include '{name}': {reason}")]
    Include { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_with_loader_source_becomes_loader_error() {
        let loader = LoaderError::UnknownCategory("nope::x".into());
        let err = minijinja::Error::new(minijinja::ErrorKind::TemplateNotFound, "not found")
            .with_source(loader.clone());

        match WikiError::from(err) {
            WikiError::Loader(inner) => assert_eq!(inner, loader),
            other => panic!("expected loader error, got {other:?}"),
        }
    }

    #[test]
    fn engine_error_with_tag_source_becomes_tag_error() {
        let tag = TagError::new("switch", "guide::intro", "missing {% endswitch %}");
        let err = minijinja::Error::new(minijinja::ErrorKind::SyntaxError, "bad tag")
            .with_source(tag.clone());
        assert!(matches!(WikiError::from(err), WikiError::Tag(inner) if inner == tag));
    }

    #[test]
    fn engine_error_with_nested_cycle_becomes_cycle_error() {
        let inner = WikiError::RenderCycle {
            name: "guide::a".into(),
        };
        let err = minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, "nested")
            .with_source(inner);
        assert!(matches!(WikiError::from(err), WikiError::RenderCycle { name } if name == "guide::a"));
    }

    #[test]
    fn plain_engine_error_stays_template_error() {
        let err = minijinja::Error::new(minijinja::ErrorKind::SyntaxError, "bad");
        assert!(matches!(WikiError::from(err), WikiError::Template(_)));
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::UnknownExtension("nope".into()).to_string(),
            "Unknown extension 'nope'"
        );
        assert_eq!(
            ConfigError::options("wiki", "bad prefix").to_string(),
            "Invalid options for extension 'wiki': bad prefix"
        );
    }
}
