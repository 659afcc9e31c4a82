//! Parser configuration.
//!
//! [`ParserConfig`] is plain data: every field has a default, so an empty
//! YAML document is a valid configuration.
//!
//! ```yaml
//! primary_format: textile
//! markdown_tag: markdown
//! strip_blanks: false
//! globals:
//!   site: Folio
//! context:
//!   this: true
//!   topic: page
//! add_extensions:
//!   - wiki: { todo_class: missing }
//! routes:
//!   topic: page_show
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::context::ContextOptions;
use crate::error::ConfigError;
use crate::markup::{FormatSettings, MarkdownFlavor, PrimaryFormat};

/// Everything needed to build a [`Parser`](crate::Parser) apart from its
/// collaborators.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub primary_format: PrimaryFormat,
    pub markdown_flavor: MarkdownFlavor,
    pub markdown_tag: Option<String>,
    pub textile_tag: Option<String>,
    pub strip_blanks: bool,
    /// Variables seeded into every render context.
    pub globals: BTreeMap<String, serde_json::Value>,
    pub context: ContextOptions,
    /// Replaces the default extension list.
    pub set_extensions: Option<Vec<serde_json::Value>>,
    /// Appended to the extension list.
    pub add_extensions: Option<Vec<serde_json::Value>>,
    pub routes: Routes,
    pub output_cache: OutputCaching,
    pub autoescape: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            primary_format: PrimaryFormat::Markdown,
            markdown_flavor: MarkdownFlavor::Extra,
            markdown_tag: None,
            textile_tag: None,
            strip_blanks: true,
            globals: BTreeMap::new(),
            context: ContextOptions::default(),
            set_extensions: None,
            add_extensions: None,
            routes: Routes::default(),
            output_cache: OutputCaching::Store,
            autoescape: false,
        }
    }
}

impl ParserConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a `.yaml`, `.yml` or `.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let load: fn(&str) -> Result<Self, ConfigError> = match format.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml,
            Some("json") => Self::from_json,
            _ => return Err(ConfigError::UnknownFormat(path.display().to_string())),
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        load(&content)
    }

    /// The format settings a parser starts with, and returns to on reset.
    pub fn format_settings(&self) -> FormatSettings {
        FormatSettings {
            primary: self.primary_format,
            markdown_tag: self.markdown_tag.clone(),
            textile_tag: self.textile_tag.clone(),
            strip_blanks: self.strip_blanks,
        }
    }
}

/// Route names and placeholders used to build link URIs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub category: String,
    pub topic: String,
    pub category_placeholder: String,
    pub topic_placeholder: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            category: "wiki_get_category".to_string(),
            topic: "wiki_get_topic".to_string(),
            category_placeholder: "category".to_string(),
            topic_placeholder: "topic".to_string(),
        }
    }
}

/// Who writes the output cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCaching {
    /// The parser stores every rendered document.
    #[default]
    Store,
    /// The parser only reads; an outer layer calls `Loader::set_output`.
    External,
}
