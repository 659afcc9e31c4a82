//! The owning web controller, as seen by the renderer.
//!
//! Links need URIs and icons need translated strings; both come from the
//! application that embeds the parser.

use std::collections::BTreeMap;
use std::sync::Arc;

/// URI building, translations and request data.
pub trait Controller: Send + Sync {
    /// Builds a URI for a named route, substituting placeholders.
    fn uri(&self, route: &str, params: &[(&str, &str)]) -> String;

    /// The translation table for the current request.
    fn translations(&self) -> Arc<dyn Translations>;

    /// The URI of the current request, if there is one.
    fn request_uri(&self) -> Option<String> {
        None
    }

    /// The raw body of the current request, if there is one.
    fn request_text(&self) -> Option<String> {
        None
    }
}

/// Translated text lookup.
///
/// A lookup miss returns the key itself. Callers compare the result against
/// the key to detect a missing translation.
pub trait Translations: Send + Sync {
    fn text(&self, key: &str) -> String;

    /// Looks up `key` and substitutes `{name}` placeholders from `vars`.
    fn format(&self, key: &str, vars: &BTreeMap<String, String>) -> String {
        vars.iter().fold(self.text(key), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
    }

    /// Whether `key` has a translation.
    fn has(&self, key: &str) -> bool {
        self.text(key) != key
    }
}
