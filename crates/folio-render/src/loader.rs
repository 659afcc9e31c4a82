//! Template source resolution and caching.
//!
//! Every document is addressed by a *compound name*,
//! `category SEPARATOR topic`. The [`Loader`] keeps three caches keyed by it:
//!
//! - category documents, keyed by bare category ident;
//! - template source text;
//! - final rendered output.
//!
//! None of them is ever invalidated by the loader itself. A cached output is
//! authoritative until the owner drops the parser or calls
//! [`Loader::clear_output`].
//!
//! Names that are not in the source cache are treated as include paths:
//! `guide::nav` resolves to the `nav` include of the `guide` category. This is
//! what makes `{% include "guide::nav" %}` work inside templates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::content::{Categories, Category, ErrorFlags, Topic};
use crate::error::{IdentityError, LoaderError};
use crate::util::{non_blank, read, write};

/// Separates the category and topic parts of a compound name.
pub const SEPARATOR: &str = "::";

/// Resolves and caches template sources and rendered output.
pub struct Loader {
    categories: Arc<dyn Categories>,
    category_docs: RwLock<HashMap<String, Arc<dyn Category>>>,
    sources: RwLock<HashMap<String, String>>,
    outputs: RwLock<HashMap<String, String>>,
}

impl Loader {
    pub fn new(categories: Arc<dyn Categories>) -> Self {
        Self {
            categories,
            category_docs: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
            outputs: RwLock::new(HashMap::new()),
        }
    }

    /// The compound name of a topic within its category.
    pub fn make_name(topic: &dyn Topic) -> Result<String, IdentityError> {
        let category = topic
            .category()
            .ok_or_else(|| IdentityError::NoCategory(topic.ident().to_string()))?;
        Self::make_name_from(category.ident(), topic.ident())
    }

    /// The compound name for a pair of idents.
    ///
    /// Both idents must be non-blank, and the category ident may not contain
    /// the separator; together these keep names unambiguous.
    pub fn make_name_from(category: &str, topic: &str) -> Result<String, IdentityError> {
        if non_blank(topic).is_none() {
            return Err(IdentityError::BlankTopic);
        }
        if non_blank(category).is_none() {
            return Err(IdentityError::BlankCategory);
        }
        // A trailing ':' would merge into the separator on split.
        if category.contains(SEPARATOR) || category.ends_with(':') {
            return Err(IdentityError::SeparatorInCategory(category.to_string()));
        }
        Ok(format!("{}{}{}", category, SEPARATOR, topic))
    }

    /// Splits a compound name at the first separator.
    pub fn split_name(name: &str) -> Option<(&str, &str)> {
        name.split_once(SEPARATOR)
    }

    pub fn has_source(&self, name: &str) -> bool {
        read(&self.sources).contains_key(name)
    }

    pub fn set_source(&self, name: &str, text: impl Into<String>) {
        write(&self.sources).insert(name.to_string(), text.into());
    }

    pub fn source(&self, name: &str) -> Option<String> {
        read(&self.sources).get(name).cloned()
    }

    pub fn output(&self, name: &str) -> Option<String> {
        read(&self.outputs).get(name).cloned()
    }

    pub fn set_output(&self, name: &str, text: impl Into<String>) {
        write(&self.outputs).insert(name.to_string(), text.into());
    }

    /// Drops one cached output, or all of them when `name` is `None`.
    pub fn clear_output(&self, name: Option<&str>) {
        let mut outputs = write(&self.outputs);
        match name {
            Some(name) => {
                outputs.remove(name);
            }
            None => outputs.clear(),
        }
    }

    /// The category with the given ident, cached after the first lookup.
    pub fn category(&self, ident: &str) -> Option<Arc<dyn Category>> {
        if let Some(category) = read(&self.category_docs).get(ident) {
            return Some(Arc::clone(category));
        }
        let category = self.categories.category(ident)?;
        write(&self.category_docs).insert(ident.to_string(), Arc::clone(&category));
        Some(category)
    }

    /// Resolves a name to template source.
    ///
    /// Cached source wins. Otherwise the name is split into a category ident
    /// and an include name, and the include text is read with no fatal
    /// errors, cached and returned.
    pub fn resolve_source(&self, name: &str) -> Result<String, LoaderError> {
        if let Some(source) = self.source(name) {
            log::trace!("source cache hit for '{}'", name);
            return Ok(source);
        }

        let (category_id, include_id) =
            Self::split_name(name).ok_or_else(|| LoaderError::MalformedName(name.to_string()))?;

        let category = self
            .category(category_id)
            .ok_or_else(|| LoaderError::UnknownCategory(name.to_string()))?;

        let include = category
            .include(include_id, ErrorFlags::NONE, ErrorFlags::ALL)
            .map_err(|err| LoaderError::Include {
                name: name.to_string(),
                reason: err.to_string(),
            })?;

        log::trace!("resolved include '{}'", name);
        self.set_source(name, include.clone());
        Ok(include)
    }

    /// The cache key for a name; names are already unique.
    pub fn cache_key<'a>(&self, name: &'a str) -> &'a str {
        name
    }

    /// Whether a cached template compiled at `_time` is still valid. Always
    /// `false`: cache lifetime belongs to the caller.
    pub fn is_fresh(&self, _name: &str, _time: u64) -> bool {
        false
    }

    /// Whether a template exists. Always `true`; failures surface from
    /// [`resolve_source`](Self::resolve_source).
    pub fn exists(&self, _name: &str) -> bool {
        true
    }
}
