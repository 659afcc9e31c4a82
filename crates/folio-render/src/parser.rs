//! The render orchestrator.
//!
//! A [`Parser`] turns a topic into HTML:
//!
//! 1. [`Parser::context_for`] builds a [`Context`] and lets every extension
//!    adjust it.
//! 2. [`Parser::parse`] returns the cached output if there is one. Otherwise
//!    it joins the category text and the topic text, renders the result as a
//!    template, and runs the markup stages over it.
//!
//! A `Parser` is a cheap, clonable handle. Renders do not share mutable
//! state, so one parser may render from several threads, and a template may
//! render another topic.
//!
//! ```rust
//! use folio_render::memory::{MemoryController, MemoryStore, Record};
//! use folio_render::{ParserBuilder, ParserConfig};
//!
//! let store = MemoryStore::new();
//! store.insert_category(Record::new("guide", "Guide"));
//! let intro = store.insert_topic("guide", Record::new("intro", "Intro").text("Hello *{{ who }}*"));
//!
//! let mut config = ParserConfig::default();
//! config.globals.insert("who".into(), "world".into());
//! let parser = ParserBuilder::new(config)
//!     .controller(MemoryController::new())
//!     .categories(store)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(parser.render(intro).unwrap(), "<p>Hello <em>world</em></p>\n");
//! ```

use std::fmt;
use std::sync::{Arc, RwLock};

use minijinja::Value;

use crate::config::{OutputCaching, ParserConfig, Routes};
use crate::content::{Categories, Category, ErrorFlags, Topic, Topics};
use crate::context::{Context, RenderScope, Variables};
use crate::controller::{Controller, Translations};
use crate::error::{ConfigError, WikiError};
use crate::extension::{ExtensionCatalog, ExtensionDef, InstalledExtension, DEFAULT_EXTENSIONS};
use crate::loader::Loader;
use crate::markup::{
    Converters, FormatSettings, MarkdownConverter, PrimaryFormat, TextileConverter,
};
use crate::template::{MiniJinjaEngine, TemplateEngine};
use crate::util::{read, write};

/// Default tag name for [`Parser::with_markdown`].
pub const MARKDOWN_TAG: &str = "markdown";

/// Default tag name for [`Parser::with_textile`].
pub const TEXTILE_TAG: &str = "textile";

/// How deep templates may nest renders of other documents.
pub const MAX_RENDER_DEPTH: usize = 8;

/// Builds a [`Parser`].
///
/// A controller and a categories store are required. Everything else falls
/// back to the configuration or to built-in defaults.
pub struct ParserBuilder {
    config: ParserConfig,
    controller: Option<Arc<dyn Controller>>,
    categories: Option<Arc<dyn Categories>>,
    engine: Option<Box<dyn TemplateEngine>>,
    converters: Option<Converters>,
    catalog: ExtensionCatalog,
    extensions: Option<Vec<InstalledExtension>>,
    extra: Vec<InstalledExtension>,
}

impl ParserBuilder {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            controller: None,
            categories: None,
            engine: None,
            converters: None,
            catalog: ExtensionCatalog::default(),
            extensions: None,
            extra: Vec::new(),
        }
    }

    pub fn controller(mut self, controller: impl Controller + 'static) -> Self {
        self.controller = Some(Arc::new(controller));
        self
    }

    pub fn categories(mut self, categories: impl Categories + 'static) -> Self {
        self.categories = Some(Arc::new(categories));
        self
    }

    /// Replaces the default MiniJinja engine.
    pub fn engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Replaces the converters chosen from the configuration.
    pub fn converters(mut self, converters: Converters) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Replaces the extension factories.
    pub fn catalog(mut self, catalog: ExtensionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Registers one more extension factory, usable from configuration.
    pub fn register_extension<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&crate::extension::ExtensionOptions) -> Result<InstalledExtension, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.catalog.register(name, factory);
        self
    }

    /// Installs exactly these extensions instead of the configured list.
    pub fn extensions(mut self, extensions: Vec<InstalledExtension>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Installs an extension after the configured ones.
    pub fn extension(mut self, extension: InstalledExtension) -> Self {
        self.extra.push(extension);
        self
    }

    pub fn build(self) -> Result<Parser, ConfigError> {
        let controller = self.controller.ok_or(ConfigError::MissingController)?;
        let categories = self.categories.ok_or(ConfigError::MissingCategories)?;

        let defs = extension_defs(&self.config)?;
        let mut extensions = match self.extensions {
            Some(extensions) => extensions,
            None => defs
                .iter()
                .map(|def| self.catalog.build(def))
                .collect::<Result<Vec<_>, _>>()?,
        };
        extensions.extend(self.extra);

        let loader = Arc::new(Loader::new(Arc::clone(&categories)));
        let autoescape = self.config.autoescape;
        let mut engine = self.engine.unwrap_or_else(|| {
            Box::new(MiniJinjaEngine::with_autoescape(autoescape)) as Box<dyn TemplateEngine>
        });
        engine.attach_loader(Arc::clone(&loader));
        for extension in &extensions {
            engine.install(extension)?;
        }

        let mut table: Vec<InstalledExtension> = Vec::with_capacity(extensions.len());
        for extension in extensions {
            match table.iter_mut().find(|e| e.name() == extension.name()) {
                Some(slot) => *slot = extension,
                None => table.push(extension),
            }
        }

        let globals: Variables = self
            .config
            .globals
            .iter()
            .map(|(name, value)| (name.clone(), Value::from_serialize(value)))
            .collect();

        let converters = self.converters.unwrap_or_else(|| Converters {
            markdown: Arc::new(MarkdownConverter::new(self.config.markdown_flavor)),
            textile: Arc::new(TextileConverter::default()),
        });

        let defaults = self.config.format_settings();
        log::debug!(
            "built parser: format={}, extensions=[{}]",
            defaults.primary,
            table.iter().map(|e| e.name()).collect::<Vec<_>>().join(", ")
        );

        Ok(Parser {
            inner: Arc::new(ParserInner {
                format: RwLock::new(defaults.clone()),
                defaults,
                config: self.config,
                controller,
                categories,
                loader,
                engine,
                converters,
                extensions: table,
                globals,
            }),
        })
    }
}

/// The extension list a configuration asks for.
fn extension_defs(config: &ParserConfig) -> Result<Vec<ExtensionDef>, ConfigError> {
    let mut defs = match &config.set_extensions {
        Some(values) => values
            .iter()
            .map(ExtensionDef::try_from)
            .collect::<Result<Vec<_>, _>>()?,
        None => DEFAULT_EXTENSIONS
            .iter()
            .map(|name| ExtensionDef::named(*name))
            .collect(),
    };
    if let Some(values) = &config.add_extensions {
        for value in values {
            defs.push(ExtensionDef::try_from(value)?);
        }
    }
    Ok(defs)
}

struct ParserInner {
    config: ParserConfig,
    controller: Arc<dyn Controller>,
    categories: Arc<dyn Categories>,
    loader: Arc<Loader>,
    engine: Box<dyn TemplateEngine>,
    converters: Converters,
    extensions: Vec<InstalledExtension>,
    globals: Variables,
    defaults: FormatSettings,
    format: RwLock<FormatSettings>,
}

/// Renders topics to HTML.
#[derive(Clone)]
pub struct Parser {
    inner: Arc<ParserInner>,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("format", &self.format())
            .field("extensions", &self.inner.extensions.iter().map(|e| e.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// A fresh context for `topic`, after every extension's
    /// [`setup_context`](crate::extension::Extension::setup_context) ran.
    pub fn context_for(&self, topic: Arc<dyn Topic>) -> Result<Context, WikiError> {
        let mut context = Context::new(
            self.clone(),
            topic,
            &self.inner.globals,
            &self.inner.config.context,
        )?;
        for extension in &self.inner.extensions {
            extension.setup_context(&mut context);
        }
        Ok(context)
    }

    /// Renders a topic to HTML.
    pub fn render(&self, topic: Arc<dyn Topic>) -> Result<String, WikiError> {
        self.context_for(topic)?.render()
    }

    /// Renders a topic from inside the render of `parent`.
    ///
    /// Fails with [`WikiError::RenderCycle`] when the topic is already being
    /// rendered further out.
    pub fn render_within(&self, topic: Arc<dyn Topic>, parent: &RenderScope) -> Result<String, WikiError> {
        let mut context = self.context_for(topic)?;
        context.inherit(parent);
        context.render()
    }

    /// Renders the topic bound to `context`.
    pub fn parse(&self, context: &Context) -> Result<String, WikiError> {
        let loader = &self.inner.loader;
        let name = Loader::make_name_from(context.category().ident(), context.topic().ident())?;

        if let Some(output) = loader.output(&name) {
            log::trace!("output cache hit for '{}'", name);
            return Ok(output);
        }

        let stack = context.scope().stack();
        if stack.contains(&name) {
            return Err(WikiError::RenderCycle { name });
        }
        if stack.len() >= MAX_RENDER_DEPTH {
            return Err(WikiError::RenderDepth {
                name,
                limit: MAX_RENDER_DEPTH,
            });
        }
        let scope = context.scope().entered(&name);

        let category_text = context.category().text(ErrorFlags::NONE, ErrorFlags::ALL)?;
        let topic_text = context.topic().text(ErrorFlags::ALL, ErrorFlags::ALL)?;
        let (category_text, topic_text) = (category_text.trim(), topic_text.trim());
        let source = if category_text.is_empty() {
            topic_text.to_string()
        } else {
            format!("{}\n{}", category_text, topic_text)
        };

        loader.set_source(&name, source);
        let text = self
            .inner
            .engine
            .render(&name, context.snapshot(), &scope)?;
        let html = self.inner.converters.apply(&text, &self.format())?;

        if self.inner.config.output_cache == OutputCaching::Store {
            loader.set_output(&name, html.clone());
        }
        log::debug!("rendered '{}' ({} bytes)", name, html.len());
        Ok(html)
    }

    /// The current format settings.
    pub fn format(&self) -> FormatSettings {
        read(&self.inner.format).clone()
    }

    fn update_format(&self, update: impl FnOnce(&mut FormatSettings)) -> &Self {
        update(&mut write(&self.inner.format));
        self
    }

    pub fn use_none(&self) -> &Self {
        self.update_format(|f| f.primary = PrimaryFormat::None)
    }

    pub fn use_markdown(&self) -> &Self {
        self.update_format(|f| f.primary = PrimaryFormat::Markdown)
    }

    pub fn use_textile(&self) -> &Self {
        self.update_format(|f| f.primary = PrimaryFormat::Textile)
    }

    /// Converts `<tag>...</tag>` blocks with Markdown. See [`MARKDOWN_TAG`].
    pub fn with_markdown(&self, tag: impl Into<String>) -> &Self {
        let tag = tag.into();
        self.update_format(|f| f.markdown_tag = Some(tag))
    }

    /// Converts `<tag>...</tag>` blocks with Textile. See [`TEXTILE_TAG`].
    pub fn with_textile(&self, tag: impl Into<String>) -> &Self {
        let tag = tag.into();
        self.update_format(|f| f.textile_tag = Some(tag))
    }

    pub fn strip_blanks(&self, strip: bool) -> &Self {
        self.update_format(|f| f.strip_blanks = strip)
    }

    pub fn allow_blanks(&self, allow: bool) -> &Self {
        self.update_format(|f| f.strip_blanks = !allow)
    }

    /// Restores the format settings the parser was built with.
    pub fn reset_format(&self) -> &Self {
        let defaults = self.inner.defaults.clone();
        self.update_format(|f| *f = defaults)
    }

    pub fn config(&self) -> &ParserConfig {
        &self.inner.config
    }

    pub fn routes(&self) -> &Routes {
        &self.inner.config.routes
    }

    pub fn controller(&self) -> &Arc<dyn Controller> {
        &self.inner.controller
    }

    pub fn translations(&self) -> Arc<dyn Translations> {
        self.inner.controller.translations()
    }

    /// A translated string; a miss returns `key`.
    pub fn text(&self, key: &str) -> String {
        self.translations().text(key)
    }

    pub fn categories(&self) -> &Arc<dyn Categories> {
        &self.inner.categories
    }

    pub fn topics(&self) -> Arc<dyn Topics> {
        self.inner.categories.topics()
    }

    pub fn category(&self, ident: &str) -> Option<Arc<dyn Category>> {
        self.inner.loader.category(ident)
    }

    /// A topic looked up in the named category.
    pub fn topic_in(&self, category: &str, ident: &str) -> Option<Arc<dyn Topic>> {
        self.category(category)?.topic(ident)
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.inner.loader
    }

    pub fn engine(&self) -> &dyn TemplateEngine {
        self.inner.engine.as_ref()
    }

    pub fn converters(&self) -> &Converters {
        &self.inner.converters
    }

    pub fn extension(&self, name: &str) -> Option<&InstalledExtension> {
        self.inner.extensions.iter().find(|e| e.name() == name)
    }

    /// Installed extensions in registration order.
    pub fn extensions(&self) -> &[InstalledExtension] {
        &self.inner.extensions
    }
}
