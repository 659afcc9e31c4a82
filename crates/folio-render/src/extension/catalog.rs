//! Named extension factories.
//!
//! Configuration refers to extensions by name. An [`ExtensionDef`] is either
//! a bare name (`wiki`) or a single-key map from a name to its options
//! (`{ wiki: { todo_class: missing } }`). The [`ExtensionCatalog`] turns a
//! definition into an [`InstalledExtension`] through the factory registered
//! under that name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use super::{FormattingExtension, InstalledExtension, SwitchExtension, WikiExtension};
use crate::error::ConfigError;
use crate::util::non_blank;

/// The extensions a parser installs unless configured otherwise.
pub const DEFAULT_EXTENSIONS: &[&str] = &["wiki", "formatting", "switch"];

/// Options passed to an extension factory.
pub type ExtensionOptions = Map<String, JsonValue>;

/// Builds an installed extension from its options.
pub type ExtensionFactory =
    Arc<dyn Fn(&ExtensionOptions) -> Result<InstalledExtension, ConfigError> + Send + Sync>;

/// One entry of an extension list.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDef {
    pub name: String,
    pub options: ExtensionOptions,
}

impl ExtensionDef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: ExtensionOptions::new(),
        }
    }

    pub fn with_options(name: impl Into<String>, options: ExtensionOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

impl TryFrom<&JsonValue> for ExtensionDef {
    type Error = ConfigError;

    fn try_from(value: &JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::String(name) => non_blank(name)
                .map(Self::named)
                .ok_or_else(|| ConfigError::InvalidExtension(value.to_string())),
            JsonValue::Object(map) if map.len() == 1 => {
                let (name, options) = map
                    .iter()
                    .next()
                    .ok_or_else(|| ConfigError::InvalidExtension(value.to_string()))?;
                match options {
                    JsonValue::Object(options) => Ok(Self::with_options(name, options.clone())),
                    JsonValue::Null => Ok(Self::named(name)),
                    _ => Err(ConfigError::InvalidExtension(value.to_string())),
                }
            }
            _ => Err(ConfigError::InvalidExtension(value.to_string())),
        }
    }
}

/// Extension factories by name.
#[derive(Clone)]
pub struct ExtensionCatalog {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionCatalog")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ExtensionCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register("wiki", |options| {
            InstalledExtension::new(WikiExtension::from_options(options)?)
        });
        catalog.register("formatting", |options| {
            reject_options("formatting", options)?;
            InstalledExtension::new(FormattingExtension)
        });
        catalog.register("switch", |options| {
            reject_options("switch", options)?;
            InstalledExtension::new(SwitchExtension::new())
        });
        catalog
    }
}

impl ExtensionCatalog {
    /// A catalog without the built-in extensions.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers a factory, replacing any factory of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ExtensionOptions) -> Result<InstalledExtension, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn build(&self, def: &ExtensionDef) -> Result<InstalledExtension, ConfigError> {
        let factory = self
            .factories
            .get(&def.name)
            .ok_or_else(|| ConfigError::UnknownExtension(def.name.clone()))?;
        factory(&def.options)
    }
}

fn reject_options(extension: &str, options: &ExtensionOptions) -> Result<(), ConfigError> {
    match options.keys().next() {
        Some(key) => Err(ConfigError::options(extension, format!("unknown option '{}'", key))),
        None => Ok(()),
    }
}
