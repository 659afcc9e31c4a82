//! Content model capabilities.
//!
//! The render pipeline never owns wiki content. It reads categories and topics
//! through the traits in this module, which an embedding application
//! implements on top of its database or filesystem. An in-memory
//! implementation lives in [`crate::memory`].
//!
//! # Error policy
//!
//! Reading content takes two [`ErrorFlags`] sets: errors in the `fatal` set
//! are returned to the caller, errors in the `log` set are logged as warnings
//! and the text degrades to empty. [`ContentError::degrade`] implements that
//! policy so stores don't have to.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use thiserror::Error;

/// A bitset over the classes of content errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorFlags(u8);

impl ErrorFlags {
    pub const NONE: ErrorFlags = ErrorFlags(0);
    pub const MISSING: ErrorFlags = ErrorFlags(1);
    pub const INVALID: ErrorFlags = ErrorFlags(2);
    pub const IO: ErrorFlags = ErrorFlags(4);
    pub const ALL: ErrorFlags = ErrorFlags(7);

    /// Builds a flag set from raw bits, ignoring unknown bits.
    pub fn from_bits(bits: u8) -> Self {
        ErrorFlags(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub fn contains(self, other: ErrorFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ErrorFlags {
    type Output = ErrorFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ErrorFlags(self.0 | rhs.0)
    }
}

/// The class of a content error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorKind {
    /// The document or include does not exist.
    Missing,
    /// The document exists but its text is unusable.
    Invalid,
    /// The backing storage failed.
    Io,
}

impl ContentErrorKind {
    /// The flag that selects this error class.
    pub fn flag(self) -> ErrorFlags {
        match self {
            ContentErrorKind::Missing => ErrorFlags::MISSING,
            ContentErrorKind::Invalid => ErrorFlags::INVALID,
            ContentErrorKind::Io => ErrorFlags::IO,
        }
    }
}

impl fmt::Display for ContentErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContentErrorKind::Missing => "missing",
            ContentErrorKind::Invalid => "invalid",
            ContentErrorKind::Io => "I/O",
        };
        f.write_str(label)
    }
}

/// An error reading content text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} content in '{ident}': {message}")]
pub struct ContentError {
    pub kind: ContentErrorKind,
    pub ident: String,
    pub message: String,
}

impl ContentError {
    pub fn new(kind: ContentErrorKind, ident: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            ident: ident.into(),
            message: message.into(),
        }
    }

    pub fn missing(ident: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ContentErrorKind::Missing, ident, message)
    }

    pub fn invalid(ident: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ContentErrorKind::Invalid, ident, message)
    }

    pub fn io(ident: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ContentErrorKind::Io, ident, message)
    }

    /// Applies the fatal/log policy to this error.
    ///
    /// Returns the error if its class is in `fatal`. Otherwise logs it when
    /// its class is in `log` and yields empty text.
    pub fn degrade(self, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError> {
        let flag = self.kind.flag();
        if fatal.contains(flag) {
            return Err(self);
        }
        if log.contains(flag) {
            log::warn!("{}", self);
        }
        Ok(String::new())
    }
}

/// Identity and raw text shared by categories and topics.
pub trait Content: Send + Sync {
    /// The unique, stable identifier.
    fn ident(&self) -> &str;

    /// The human-readable name.
    fn name(&self) -> &str;

    /// Whether links to this document may be emitted.
    fn published(&self) -> bool;

    /// The raw, unrendered source text.
    fn text(&self, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError>;

    /// Replaces the raw source text. `file` names the backing file or URL, if any.
    fn set_text(&self, text: &str, file: Option<&str>);

    /// The raw text of a named include document.
    fn include(&self, name: &str, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError>;
}

/// A top-level wiki category.
pub trait Category: Content {
    /// All topics in this category.
    fn topics(&self) -> Vec<Arc<dyn Topic>>;

    /// Looks up a topic of this category by ident.
    fn topic(&self, ident: &str) -> Option<Arc<dyn Topic>>;
}

/// A wiki topic, owned by a category.
pub trait Topic: Content {
    /// The parent category, if one can be resolved.
    fn category(&self) -> Option<Arc<dyn Category>>;

    /// Sets the parent category. With `parent_only` the stored category
    /// reference of the topic is left untouched.
    fn set_category(&self, category: Arc<dyn Category>, parent_only: bool);
}

/// The category collection.
pub trait Categories: Send + Sync {
    fn category(&self, ident: &str) -> Option<Arc<dyn Category>>;

    /// The matching topic collection.
    fn topics(&self) -> Arc<dyn Topics>;
}

/// The topic collection.
pub trait Topics: Send + Sync {
    /// All topics in the category with the given ident.
    fn topics(&self, category: &str) -> Vec<Arc<dyn Topic>>;

    fn topic(&self, category: &str, ident: &str) -> Option<Arc<dyn Topic>>;

    /// The matching category collection.
    fn categories(&self) -> Arc<dyn Categories>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_contain() {
        let flags = ErrorFlags::MISSING | ErrorFlags::IO;
        assert!(flags.contains(ErrorFlags::MISSING));
        assert!(flags.contains(ErrorFlags::IO));
        assert!(!flags.contains(ErrorFlags::INVALID));
        assert_eq!(flags.bits(), 5);
        assert_eq!(ErrorFlags::MISSING | ErrorFlags::INVALID | ErrorFlags::IO, ErrorFlags::ALL);
    }

    #[test]
    fn from_bits_masks_unknown_bits() {
        assert_eq!(ErrorFlags::from_bits(0xff), ErrorFlags::ALL);
        assert!(ErrorFlags::from_bits(0).is_empty());
    }

    #[test]
    fn fatal_flag_returns_error() {
        let err = ContentError::missing("intro", "no text");
        assert_eq!(
            err.clone().degrade(ErrorFlags::ALL, ErrorFlags::NONE),
            Err(err)
        );
    }

    #[test]
    fn non_fatal_error_degrades_to_empty() {
        let err = ContentError::io("intro", "disk gone");
        assert_eq!(
            err.degrade(ErrorFlags::MISSING, ErrorFlags::ALL),
            Ok(String::new())
        );
    }

    #[test]
    fn error_message_names_kind_and_ident() {
        let err = ContentError::invalid("intro", "bad encoding");
        assert_eq!(err.to_string(), "invalid content in 'intro': bad encoding");
    }
}
