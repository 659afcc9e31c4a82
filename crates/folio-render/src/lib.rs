//! # Folio Render - Wiki Rendering Pipeline
//!
//! `folio-render` turns wiki topics into HTML. A topic's raw text (prefixed
//! by its category's text) is expanded as a MiniJinja template, then run
//! through Markdown or Textile conversion.
//!
//! ## Core Concepts
//!
//! - [`Parser`]: the orchestrator. Built once through [`ParserBuilder`] from
//!   a [`ParserConfig`], a [`Controller`] and a [`Categories`] store.
//! - [`Context`]: the variables and [`RenderScope`] of one render.
//! - [`Loader`]: resolves template names to source and caches rendered
//!   output under a compound `category::topic` name.
//! - [`extension`]: template functions, filters, tests and block tags.
//!   `wiki`, `formatting` and `switch` are installed by default.
//! - [`Converters`]: the Markdown and Textile stages that run after
//!   template expansion.
//!
//! ## Quick Start
//!
//! ```rust
//! use folio_render::memory::{MemoryController, MemoryStore, Record};
//! use folio_render::{ParserBuilder, ParserConfig};
//!
//! let store = MemoryStore::new();
//! store.insert_category(Record::new("guide", "Guide"));
//! store.insert_topic("guide", Record::new("setup", "Setup"));
//! let intro = store.insert_topic(
//!     "guide",
//!     Record::new("intro", "Introduction").text("Read {{ 'setup'|a }} first."),
//! );
//!
//! let parser = ParserBuilder::new(ParserConfig::default())
//!     .controller(MemoryController::new())
//!     .categories(store)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     parser.render(intro).unwrap(),
//!     "<p>Read <a href=\"/wiki/guide/setup\">Setup</a> first.</p>\n"
//! );
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use folio_render::{ParserConfig, PrimaryFormat};
//!
//! let config = ParserConfig::from_yaml(r#"
//! primary_format: textile
//! markdown_tag: markdown
//! add_extensions:
//!   - wiki: { todo_class: missing }
//! "#).unwrap();
//! assert_eq!(config.primary_format, PrimaryFormat::Textile);
//! ```

mod config;
mod content;
mod context;
mod controller;
mod error;
pub mod extension;
mod html;
mod loader;
mod markup;
pub mod memory;
mod parser;
pub mod template;
mod util;
mod value;

pub use config::{OutputCaching, ParserConfig, Routes};
pub use content::{
    Categories, Category, Content, ContentError, ContentErrorKind, ErrorFlags, Topic, Topics,
};
pub use context::{Context, ContextOptions, RenderScope, SelfRef, Variables, SCOPE_VAR};
pub use controller::{Controller, Translations};
pub use error::{ConfigError, IdentityError, LoaderError, WikiError};
pub use html::{Element, ElementValue};
pub use loader::{Loader, SEPARATOR};
pub use markup::{
    convert_tagged, strip_leading_blanks, Converters, FormatSettings, MarkdownConverter,
    MarkdownFlavor, MarkupConverter, PrimaryFormat, TextileConverter,
};
pub use parser::{Parser, ParserBuilder, MARKDOWN_TAG, MAX_RENDER_DEPTH, TEXTILE_TAG};
pub use value::{CategoryValue, ParserValue, TopicValue};

pub use folio_textile::Textile;
