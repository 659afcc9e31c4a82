//! In-memory content store and controller.
//!
//! [`MemoryStore`] implements [`Categories`] and [`Topics`] over maps held in
//! memory, and [`MemoryController`] implements [`Controller`] with route
//! patterns and a translation table. They back the test suite and suit
//! embedders that load their whole wiki up front.
//!
//! ```rust
//! use folio_render::memory::{MemoryStore, Record};
//! use folio_render::{Categories, Category, Content, Topic};
//!
//! let store = MemoryStore::new();
//! store.insert_category(Record::new("guide", "Guide").text("# Guide"));
//! store.insert_topic("guide", Record::new("intro", "Introduction").text("Hello"));
//!
//! let guide = store.category("guide").unwrap();
//! let intro = guide.topic("intro").unwrap();
//! assert_eq!(intro.category().unwrap().ident(), "guide");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, Weak};

use crate::content::{Categories, Category, Content, ContentError, ErrorFlags, Topic, Topics};
use crate::controller::{Controller, Translations};
use crate::util::{read, write};

/// Data for a new category or topic.
#[derive(Debug, Clone)]
pub struct Record {
    ident: String,
    name: String,
    text: Option<String>,
    file: Option<String>,
    includes: BTreeMap<String, String>,
    published: bool,
}

impl Record {
    /// A published document with no text.
    pub fn new(ident: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            name: name.into(),
            text: None,
            file: None,
            includes: BTreeMap::new(),
            published: true,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Adds a named include document.
    pub fn include(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.includes.insert(name.into(), text.into());
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }
}

/// Fields shared by categories and topics.
#[derive(Debug)]
struct Document {
    ident: String,
    name: String,
    published: bool,
    text: RwLock<Option<String>>,
    file: RwLock<Option<String>>,
    includes: BTreeMap<String, String>,
}

impl From<Record> for Document {
    fn from(record: Record) -> Self {
        Self {
            ident: record.ident,
            name: record.name,
            published: record.published,
            text: RwLock::new(record.text),
            file: RwLock::new(record.file),
            includes: record.includes,
        }
    }
}

impl Document {
    fn text(&self, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError> {
        match read(&self.text).as_ref() {
            Some(text) => Ok(text.clone()),
            None => ContentError::missing(&self.ident, "no text has been set").degrade(fatal, log),
        }
    }

    fn set_text(&self, text: &str, file: Option<&str>) {
        *write(&self.text) = Some(text.to_string());
        if let Some(file) = file {
            *write(&self.file) = Some(file.to_string());
        }
    }

    fn include(&self, name: &str, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError> {
        match self.includes.get(name) {
            Some(text) => Ok(text.clone()),
            None => ContentError::missing(&self.ident, format!("no include named '{}'", name))
                .degrade(fatal, log),
        }
    }
}

#[derive(Default)]
struct StoreInner {
    categories: RwLock<BTreeMap<String, Arc<MemoryCategory>>>,
    topics: RwLock<BTreeMap<String, BTreeMap<String, Arc<MemoryTopic>>>>,
}

impl StoreInner {
    fn category(&self, ident: &str) -> Option<Arc<MemoryCategory>> {
        read(&self.categories).get(ident).cloned()
    }

    fn topic(&self, category: &str, ident: &str) -> Option<Arc<MemoryTopic>> {
        read(&self.topics)
            .get(category)
            .and_then(|topics| topics.get(ident))
            .cloned()
    }

    fn topics(&self, category: &str) -> Vec<Arc<MemoryTopic>> {
        read(&self.topics)
            .get(category)
            .map(|topics| topics.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// A content store held entirely in memory.
///
/// Cloning the store is cheap and yields a handle to the same content.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a category.
    pub fn insert_category(&self, record: Record) -> Arc<MemoryCategory> {
        let store = Arc::downgrade(&self.inner);
        let category = Arc::new_cyclic(|me| MemoryCategory {
            me: me.clone(),
            store,
            doc: record.into(),
            topic_cache: RwLock::new(HashMap::new()),
        });
        write(&self.inner.categories).insert(category.doc.ident.clone(), Arc::clone(&category));
        category
    }

    /// Adds (or replaces) a topic in the category with ident `category`.
    ///
    /// The category does not need to exist yet; the topic resolves it lazily.
    pub fn insert_topic(&self, category: &str, record: Record) -> Arc<MemoryTopic> {
        let topic = Arc::new(MemoryTopic {
            store: Arc::downgrade(&self.inner),
            doc: record.into(),
            category_id: RwLock::new(category.to_string()),
            parent: RwLock::new(None),
        });
        write(&self.inner.topics)
            .entry(category.to_string())
            .or_default()
            .insert(topic.doc.ident.clone(), Arc::clone(&topic));
        topic
    }

    /// The concrete category with the given ident.
    pub fn memory_category(&self, ident: &str) -> Option<Arc<MemoryCategory>> {
        self.inner.category(ident)
    }

    /// The concrete topic with the given category and topic idents.
    pub fn memory_topic(&self, category: &str, ident: &str) -> Option<Arc<MemoryTopic>> {
        self.inner.topic(category, ident)
    }
}

impl Categories for MemoryStore {
    fn category(&self, ident: &str) -> Option<Arc<dyn Category>> {
        self.inner
            .category(ident)
            .map(|category| category as Arc<dyn Category>)
    }

    fn topics(&self) -> Arc<dyn Topics> {
        Arc::new(self.clone())
    }
}

impl Topics for MemoryStore {
    fn topics(&self, category: &str) -> Vec<Arc<dyn Topic>> {
        self.inner
            .topics(category)
            .into_iter()
            .map(|topic| topic as Arc<dyn Topic>)
            .collect()
    }

    fn topic(&self, category: &str, ident: &str) -> Option<Arc<dyn Topic>> {
        self.inner
            .topic(category, ident)
            .map(|topic| topic as Arc<dyn Topic>)
    }

    fn categories(&self) -> Arc<dyn Categories> {
        Arc::new(self.clone())
    }
}

/// A category in a [`MemoryStore`].
///
/// Topics looked up through the category are cached and bound to it as
/// their parent.
pub struct MemoryCategory {
    me: Weak<MemoryCategory>,
    store: Weak<StoreInner>,
    doc: Document,
    topic_cache: RwLock<HashMap<String, Weak<MemoryTopic>>>,
}

impl MemoryCategory {
    /// The backing file, if one was set.
    pub fn file(&self) -> Option<String> {
        read(&self.doc.file).clone()
    }
}

impl Content for MemoryCategory {
    fn ident(&self) -> &str {
        &self.doc.ident
    }

    fn name(&self) -> &str {
        &self.doc.name
    }

    fn published(&self) -> bool {
        self.doc.published
    }

    fn text(&self, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError> {
        self.doc.text(fatal, log)
    }

    fn set_text(&self, text: &str, file: Option<&str>) {
        self.doc.set_text(text, file)
    }

    fn include(&self, name: &str, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError> {
        self.doc.include(name, fatal, log)
    }
}

impl Category for MemoryCategory {
    fn topics(&self) -> Vec<Arc<dyn Topic>> {
        self.store
            .upgrade()
            .map(|store| {
                store
                    .topics(&self.doc.ident)
                    .into_iter()
                    .map(|topic| topic as Arc<dyn Topic>)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn topic(&self, ident: &str) -> Option<Arc<dyn Topic>> {
        if let Some(topic) = read(&self.topic_cache).get(ident).and_then(Weak::upgrade) {
            return Some(topic as Arc<dyn Topic>);
        }

        let topic = self.store.upgrade()?.topic(&self.doc.ident, ident)?;
        if let Some(me) = self.me.upgrade() {
            topic.set_category(me, true);
        }
        write(&self.topic_cache).insert(ident.to_string(), Arc::downgrade(&topic));
        Some(topic as Arc<dyn Topic>)
    }
}

/// A topic in a [`MemoryStore`].
pub struct MemoryTopic {
    store: Weak<StoreInner>,
    doc: Document,
    category_id: RwLock<String>,
    parent: RwLock<Option<Arc<dyn Category>>>,
}

impl MemoryTopic {
    /// The stored category ident.
    pub fn category_id(&self) -> String {
        read(&self.category_id).clone()
    }

    pub fn file(&self) -> Option<String> {
        read(&self.doc.file).clone()
    }

    /// Forgets the memoized parent so the next lookup resolves it again.
    pub fn reset_category(&self) {
        *write(&self.parent) = None;
    }
}

impl Content for MemoryTopic {
    fn ident(&self) -> &str {
        &self.doc.ident
    }

    fn name(&self) -> &str {
        &self.doc.name
    }

    fn published(&self) -> bool {
        self.doc.published
    }

    fn text(&self, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError> {
        self.doc.text(fatal, log)
    }

    fn set_text(&self, text: &str, file: Option<&str>) {
        self.doc.set_text(text, file)
    }

    fn include(&self, name: &str, fatal: ErrorFlags, log: ErrorFlags) -> Result<String, ContentError> {
        self.doc.include(name, fatal, log)
    }
}

impl Topic for MemoryTopic {
    fn category(&self) -> Option<Arc<dyn Category>> {
        if let Some(parent) = read(&self.parent).as_ref() {
            return Some(Arc::clone(parent));
        }

        let category_id = self.category_id();
        if category_id.trim().is_empty() {
            return None;
        }
        let category: Arc<dyn Category> = self.store.upgrade()?.category(&category_id)?;
        *write(&self.parent) = Some(Arc::clone(&category));
        Some(category)
    }

    fn set_category(&self, category: Arc<dyn Category>, parent_only: bool) {
        if !parent_only {
            *write(&self.category_id) = category.ident().to_string();
        }
        *write(&self.parent) = Some(category);
    }
}

/// A translation table.
#[derive(Debug, Clone, Default)]
pub struct MemoryTranslations {
    entries: BTreeMap<String, String>,
}

impl MemoryTranslations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), text.into());
    }
}

impl Translations for MemoryTranslations {
    fn text(&self, key: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

/// A controller with route patterns and a fixed translation table.
///
/// Route patterns contain `{placeholder}` markers that [`Controller::uri`]
/// fills from its parameters. Unknown routes fall back to
/// `/<route>/<value>/...`.
#[derive(Debug, Clone)]
pub struct MemoryController {
    routes: BTreeMap<String, String>,
    translations: Arc<MemoryTranslations>,
    request_uri: Option<String>,
    request_text: Option<String>,
}

impl Default for MemoryController {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryController {
    /// A controller with the default wiki routes.
    pub fn new() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert("wiki_get_category".to_string(), "/wiki/{category}".to_string());
        routes.insert(
            "wiki_get_topic".to_string(),
            "/wiki/{category}/{topic}".to_string(),
        );
        Self {
            routes,
            translations: Arc::new(MemoryTranslations::new()),
            request_uri: None,
            request_text: None,
        }
    }

    pub fn route(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.routes.insert(name.into(), pattern.into());
        self
    }

    pub fn translation(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.translations).insert(key, text);
        self
    }

    pub fn with_request_uri(mut self, uri: impl Into<String>) -> Self {
        self.request_uri = Some(uri.into());
        self
    }

    pub fn with_request_text(mut self, text: impl Into<String>) -> Self {
        self.request_text = Some(text.into());
        self
    }
}

impl Controller for MemoryController {
    fn uri(&self, route: &str, params: &[(&str, &str)]) -> String {
        match self.routes.get(route) {
            Some(pattern) => params.iter().fold(pattern.clone(), |uri, (name, value)| {
                uri.replace(&format!("{{{}}}", name), value)
            }),
            None => params
                .iter()
                .fold(format!("/{}", route), |uri, (_, value)| format!("{}/{}", uri, value)),
        }
    }

    fn translations(&self) -> Arc<dyn Translations> {
        Arc::clone(&self.translations) as Arc<dyn Translations>
    }

    fn request_uri(&self) -> Option<String> {
        self.request_uri.clone()
    }

    fn request_text(&self) -> Option<String> {
        self.request_text.clone()
    }
}
