//! Cross-document links and icons.
//!
//! Functions:
//!
//! | name       | arguments                                               |
//! |------------|---------------------------------------------------------|
//! | `at`       | topic, category?, text?, description?, class?, object?  |
//! | `ac`       | category, topic?, text?, description?, class?, object?  |
//! | `ai`       | text?, description?, class?, object?                    |
//! | `todo`     | text, object?                                           |
//! | `i`        | id, description?, class?, object?                       |
//! | `topic`    | ident?                                                  |
//! | `category` | ident?                                                  |
//! | `text`     | key, placeholders?                                      |
//!
//! Filters: `a` (link mini-language, see [`LinkStatement`]), `i` (icon
//! mini-language, see [`IconStatement`]), `topic` (a topic of a category) and
//! `todo`.
//!
//! Links to documents that do not exist or are not published become to-do
//! markers; only published documents ever get a real link.

use std::collections::BTreeMap;

use minijinja::{Error, Value};
use serde::Deserialize;

use super::call::{arg, arg_bool, arg_string, required_string, CallScope};
use super::catalog::ExtensionOptions;
use super::link::{IconStatement, LinkStatement, LinkTarget};
use super::{Extension, Registry, Safety};
use crate::context::{Context, RenderScope};
use crate::controller::Translations;
use crate::error::ConfigError;
use crate::html::Element;
use crate::value::{CategoryValue, TopicValue};

/// Options of the wiki extension.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WikiOptions {
    /// Prefix of icon translation keys.
    pub icon_prefix: String,
    /// Suffix of the key holding an icon's character.
    pub icon_char: String,
    /// Suffix of the key holding an icon's description.
    pub icon_desc: String,
    /// Suffix of the key holding an icon's extra classes.
    pub icon_class: String,
    pub todo_href: String,
    pub todo_class: String,
}

impl Default for WikiOptions {
    fn default() -> Self {
        Self {
            icon_prefix: "i.".to_string(),
            icon_char: ".char".to_string(),
            icon_desc: ".desc".to_string(),
            icon_class: ".class".to_string(),
            todo_href: "#todo".to_string(),
            todo_class: "todo".to_string(),
        }
    }
}

/// Optional link attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkText<'a> {
    pub text: Option<&'a str>,
    pub description: Option<&'a str>,
    pub class: Option<&'a str>,
}

/// Link and icon helpers for wiki templates.
#[derive(Debug, Clone, Default)]
pub struct WikiExtension {
    options: WikiOptions,
}

impl WikiExtension {
    pub fn new(options: WikiOptions) -> Self {
        Self { options }
    }

    pub fn from_options(options: &ExtensionOptions) -> Result<Self, ConfigError> {
        let options = serde_json::from_value(serde_json::Value::Object(options.clone()))
            .map_err(|err| ConfigError::options("wiki", err.to_string()))?;
        Ok(Self::new(options))
    }

    pub fn options(&self) -> &WikiOptions {
        &self.options
    }

    /// A to-do marker in place of a link.
    pub fn todo(&self, text: &str) -> Element {
        Element::new("a", text)
            .with_attr("href", self.options.todo_href.as_str())
            .with_attr("class", self.options.todo_class.as_str())
    }

    /// The marker for a link statement that could not be parsed.
    pub fn invalid_link(&self) -> Element {
        Element::empty("a")
    }

    fn link(&self, uri: String, text: &str, attrs: LinkText<'_>) -> Element {
        let mut link = Element::new("a", text).with_attr("href", uri);
        if let Some(description) = attrs.description {
            link.set_attr("title", description);
        }
        if let Some(class) = attrs.class {
            link.set_attr("class", class);
        }
        link
    }

    /// A link to a topic in `category`, or in the current category.
    pub fn topic_link(
        &self,
        scope: &RenderScope,
        topic: &str,
        category: Option<&str>,
        attrs: LinkText<'_>,
    ) -> Element {
        let Some(doc) = scope.find_topic(Some(topic), category) else {
            return self.todo(attrs.text.unwrap_or(topic));
        };
        let text = attrs.text.unwrap_or(doc.name());
        if !doc.published() {
            return self.todo(text);
        }

        let category = category.unwrap_or(scope.category().ident());
        let parser = scope.parser();
        let routes = parser.routes();
        let uri = parser.controller().uri(
            &routes.topic,
            &[
                (routes.category_placeholder.as_str(), category),
                (routes.topic_placeholder.as_str(), topic),
            ],
        );
        self.link(uri, text, attrs)
    }

    /// A link to a category, or to one of its topics when `topic` is given.
    pub fn category_link(
        &self,
        scope: &RenderScope,
        category: &str,
        topic: Option<&str>,
        attrs: LinkText<'_>,
    ) -> Element {
        if let Some(topic) = topic {
            return self.topic_link(scope, topic, Some(category), attrs);
        }

        let Some(doc) = scope.find_category(Some(category)) else {
            return self.todo(attrs.text.unwrap_or(category));
        };
        let text = attrs.text.unwrap_or(doc.name());
        if !doc.published() {
            return self.todo(text);
        }

        let parser = scope.parser();
        let routes = parser.routes();
        let uri = parser.controller().uri(
            &routes.category,
            &[(routes.category_placeholder.as_str(), category)],
        );
        self.link(uri, text, attrs)
    }

    /// A link to the current category.
    pub fn index_link(&self, scope: Option<&RenderScope>, attrs: LinkText<'_>) -> Element {
        match scope {
            Some(scope) => {
                let category = scope.category().ident().to_string();
                self.category_link(scope, &category, None, attrs)
            }
            None => {
                log::warn!("attempt to make index link with no current category");
                self.invalid_link()
            }
        }
    }

    /// A link described by the mini-language. Returns the element and
    /// whether the statement asked for an element.
    pub fn link_statement(
        &self,
        scope: &RenderScope,
        input: &str,
        attrs: LinkText<'_>,
    ) -> (Element, bool) {
        let parsed = LinkStatement::parse(input);
        let attrs = LinkText {
            text: parsed.text.as_deref().or(attrs.text),
            description: parsed.description.as_deref().or(attrs.description),
            class: parsed.class.as_deref().or(attrs.class),
        };

        let element = match &parsed.target {
            LinkTarget::Invalid(reason) => {
                log::warn!("invalid link statement '{}': {}", input, reason);
                self.invalid_link()
            }
            LinkTarget::Index => self.index_link(Some(scope), attrs),
            LinkTarget::Topic(topic) => self.topic_link(scope, topic, None, attrs),
            LinkTarget::CategoryTopic { category, topic } => {
                self.category_link(scope, category, Some(topic), attrs)
            }
        };
        (element, parsed.as_object)
    }

    /// An icon. Character, extra classes and description come from the
    /// translation table; a lookup that returns its key is a miss.
    pub fn icon(
        &self,
        translations: &dyn Translations,
        id: &str,
        description: Option<&str>,
        class: &str,
    ) -> Element {
        let lookup = |suffix: &str| {
            let key = format!("{}{}{}", self.options.icon_prefix, id, suffix);
            let text = translations.text(&key);
            (text != key).then_some(text)
        };

        let character = lookup(&self.options.icon_char).unwrap_or_default();
        let mut classes = class.to_string();
        if let Some(extra) = lookup(&self.options.icon_class) {
            classes.push(' ');
            classes.push_str(&extra);
        }
        classes.push(' ');
        classes.push_str(id);

        let description = match description {
            Some(description) => Some(description.to_string()),
            None => lookup(&self.options.icon_desc),
        };

        let mut icon = Element::new("i", character).with_attr("class", classes.trim());
        if let Some(description) = description {
            icon.set_attr("title", description);
        }
        icon
    }

    /// An icon described by `id[/description[/class ...]]`. Segments
    /// override the corresponding arguments.
    pub fn icon_statement(
        &self,
        translations: &dyn Translations,
        input: &str,
        description: Option<&str>,
        class: &str,
    ) -> Element {
        let parsed = IconStatement::parse(input);
        self.icon(
            translations,
            parsed.id.trim(),
            parsed.description.as_deref().or(description),
            parsed.class.as_deref().unwrap_or(class),
        )
    }

    fn at(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let topic = required_string(args, 0, "topic")?;
        let category = arg_string(args, 1);
        let (text, description, class) = (arg_string(args, 2), arg_string(args, 3), arg_string(args, 4));
        let link = self.topic_link(
            render,
            &topic,
            category.as_deref(),
            link_text(&text, &description, &class),
        );
        Ok(emit(link, arg_bool(args, 5)))
    }

    fn ac(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let category = required_string(args, 0, "category")?;
        let topic = arg_string(args, 1);
        let (text, description, class) = (arg_string(args, 2), arg_string(args, 3), arg_string(args, 4));
        let link = self.category_link(
            render,
            &category,
            topic.as_deref(),
            link_text(&text, &description, &class),
        );
        Ok(emit(link, arg_bool(args, 5)))
    }

    fn ai(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let (text, description, class) = (arg_string(args, 0), arg_string(args, 1), arg_string(args, 2));
        let link = self.index_link(scope.render(), link_text(&text, &description, &class));
        Ok(emit(link, arg_bool(args, 3)))
    }

    fn todo_call(&self, _scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let text = required_string(args, 0, "text")?;
        Ok(emit(self.todo(&text), arg_bool(args, 1)))
    }

    fn i(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let id = required_string(args, 0, "id")?;
        let description = arg_string(args, 1);
        let class = arg_string(args, 2).unwrap_or_default();
        let translations = render.parser().controller().translations();
        let icon = self.icon(translations.as_ref(), &id, description.as_deref(), &class);
        Ok(emit(icon, arg_bool(args, 3)))
    }

    fn topic_call(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let ident = arg_string(args, 0);
        Ok(render
            .find_topic(ident.as_deref(), None)
            .map(|topic| TopicValue::new(topic, render.parser().clone()).into())
            .unwrap_or(Value::from(())))
    }

    fn category_call(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let ident = arg_string(args, 0);
        Ok(render
            .find_category(ident.as_deref())
            .map(|category| CategoryValue::new(category, render.parser().clone()).into())
            .unwrap_or(Value::from(())))
    }

    fn text(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let key = required_string(args, 0, "key")?;
        let translations = render.parser().controller().translations();
        let text = match arg(args, 1) {
            Some(vars) => {
                let mut placeholders = BTreeMap::new();
                for name in vars.try_iter()? {
                    let value = vars.get_item(&name)?;
                    placeholders.insert(name.to_string(), value.to_string());
                }
                translations.format(&key, &placeholders)
            }
            None => translations.text(&key),
        };
        Ok(Value::from(text))
    }

    fn link_filter(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let input = required_string(args, 0, "link")?;
        let (text, description, class) = (arg_string(args, 1), arg_string(args, 2), arg_string(args, 3));
        let (link, as_object) =
            self.link_statement(render, &input, link_text(&text, &description, &class));
        Ok(emit(link, as_object || arg_bool(args, 4)))
    }

    fn icon_filter(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let input = required_string(args, 0, "icon")?;
        let description = arg_string(args, 1);
        let class = arg_string(args, 2).unwrap_or_default();
        let translations = render.parser().controller().translations();
        let icon =
            self.icon_statement(translations.as_ref(), &input, description.as_deref(), &class);
        Ok(emit(icon, arg_bool(args, 3)))
    }

    fn topic_filter(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let ident = required_string(args, 1, "topic")?;
        let category = match arg(args, 0) {
            Some(value) => match value.downcast_object_ref::<CategoryValue>() {
                Some(category) => Some(category.category().clone()),
                None => value.as_str().and_then(|ident| render.parser().category(ident)),
            },
            None => None,
        };
        Ok(category
            .and_then(|category| category.topic(&ident))
            .map(|topic| TopicValue::new(topic, render.parser().clone()).into())
            .unwrap_or(Value::from(())))
    }
}

fn link_text<'a>(
    text: &'a Option<String>,
    description: &'a Option<String>,
    class: &'a Option<String>,
) -> LinkText<'a> {
    LinkText {
        text: text.as_deref(),
        description: description.as_deref(),
        class: class.as_deref(),
    }
}

fn emit(element: Element, as_object: bool) -> Value {
    if as_object {
        element.into()
    } else {
        Value::from_safe_string(element.to_html())
    }
}

impl Extension for WikiExtension {
    fn name(&self) -> &str {
        "wiki"
    }

    fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError> {
        registry
            .function("at").method(Self::at).safe(Safety::All).needs_context().add()?
            .function("ac").method(Self::ac).safe(Safety::All).needs_context().add()?
            .function("ai").method(Self::ai).safe(Safety::All).needs_context().add()?
            .function("todo").method(Self::todo_call).safe(Safety::All).add()?
            .function("i").method(Self::i).safe(Safety::All).needs_context().add()?
            .function("topic").method(Self::topic_call).safe(Safety::All).needs_context().add()?
            .function("category").method(Self::category_call).safe(Safety::All).needs_context().add()?
            .function("text").method(Self::text).safe(Safety::All).needs_context().add()?;

        registry
            .filter("a").method(Self::link_filter).safe(Safety::All).needs_context().add()?
            .filter("i").method(Self::icon_filter).safe(Safety::All).needs_context().add()?
            .filter("topic").method(Self::topic_filter).safe(Safety::All).needs_context().add()?
            .filter("todo").method(Self::todo_call).safe(Safety::All).add()?;

        Ok(())
    }

    fn setup_context(&self, context: &mut Context) {
        let home = self.index_link(Some(context.scope()), LinkText::default());
        context.set("home", Value::from_safe_string(home.to_html()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Topic;
    use crate::memory::{MemoryController, MemoryStore, Record};
    use crate::{Parser, ParserBuilder, ParserConfig};
    use std::sync::Arc;

    fn fixture() -> (MemoryStore, Parser) {
        let store = MemoryStore::new();
        store.insert_category(Record::new("guide", "Guide"));
        store.insert_category(Record::new("attic", "Attic").published(false));
        store.insert_topic("guide", Record::new("intro", "Introduction"));
        store.insert_topic("guide", Record::new("draft", "Draft").published(false));
        store.insert_topic("attic", Record::new("old", "Old Stuff"));
        let controller = MemoryController::new()
            .translation("i.star.char", "★")
            .translation("i.star.class", "icon")
            .translation("i.star.desc", "Favourite");
        let parser = ParserBuilder::new(ParserConfig::default())
            .controller(controller)
            .categories(store.clone())
            .extensions(Vec::new())
            .build()
            .unwrap();
        (store, parser)
    }

    fn scope(store: &MemoryStore, parser: &Parser) -> RenderScope {
        let topic: Arc<dyn Topic> = store.memory_topic("guide", "intro").unwrap();
        parser.context_for(topic).unwrap().scope().clone()
    }

    #[test]
    fn topic_link_in_current_category() {
        let (store, parser) = fixture();
        let wiki = WikiExtension::default();
        let link = wiki.topic_link(&scope(&store, &parser), "intro", None, LinkText::default());
        assert_eq!(link.to_html(), r#"<a href="/wiki/guide/intro">Introduction</a>"#);
    }

    #[test]
    fn topic_link_attributes() {
        let (store, parser) = fixture();
        let wiki = WikiExtension::default();
        let attrs = LinkText {
            text: Some("Start"),
            description: Some("Read me"),
            class: Some("nav"),
        };
        let link = wiki.topic_link(&scope(&store, &parser), "intro", None, attrs);
        assert_eq!(
            link.to_html(),
            r#"<a href="/wiki/guide/intro" title="Read me" class="nav">Start</a>"#
        );
    }

    #[test]
    fn missing_topic_is_todo() {
        let (store, parser) = fixture();
        let wiki = WikiExtension::default();
        let s = scope(&store, &parser);
        assert_eq!(
            wiki.topic_link(&s, "ghost", None, LinkText::default()).to_html(),
            r##"<a href="#todo" class="todo">ghost</a>"##
        );
        let attrs = LinkText {
            text: Some("Boo"),
            ..Default::default()
        };
        assert_eq!(
            wiki.topic_link(&s, "ghost", None, attrs).to_html(),
            r##"<a href="#todo" class="todo">Boo</a>"##
        );
    }

    #[test]
    fn unpublished_documents_are_todo() {
        let (store, parser) = fixture();
        let wiki = WikiExtension::default();
        let s = scope(&store, &parser);
        assert_eq!(
            wiki.topic_link(&s, "draft", None, LinkText::default()).to_html(),
            r##"<a href="#todo" class="todo">Draft</a>"##
        );
        assert_eq!(
            wiki.category_link(&s, "attic", None, LinkText::default()).to_html(),
            r##"<a href="#todo" class="todo">Attic</a>"##
        );
    }

    #[test]
    fn category_link_delegates_with_topic() {
        let (store, parser) = fixture();
        let wiki = WikiExtension::default();
        let s = scope(&store, &parser);
        assert_eq!(
            wiki.category_link(&s, "guide", None, LinkText::default()).to_html(),
            r#"<a href="/wiki/guide">Guide</a>"#
        );
        // The topic of an unpublished category is published on its own.
        assert_eq!(
            wiki.category_link(&s, "attic", Some("old"), LinkText::default()).to_html(),
            r#"<a href="/wiki/attic/old">Old Stuff</a>"#
        );
    }

    #[test]
    fn index_link() {
        let (store, parser) = fixture();
        let wiki = WikiExtension::default();
        let s = scope(&store, &parser);
        assert_eq!(
            wiki.index_link(Some(&s), LinkText::default()).to_html(),
            r#"<a href="/wiki/guide">Guide</a>"#
        );
        assert_eq!(wiki.index_link(None, LinkText::default()).to_html(), "<a/>");
    }

    #[test]
    fn link_statements() {
        let (store, parser) = fixture();
        let wiki = WikiExtension::default();
        let s = scope(&store, &parser);
        let (link, as_object) = wiki.link_statement(&s, "guide/intro == Go .= big", LinkText::default());
        assert_eq!(link.to_html(), r#"<a href="/wiki/guide/intro" class="big">Go</a>"#);
        assert!(!as_object);

        let (link, as_object) = wiki.link_statement(&s, "$/", LinkText::default());
        assert_eq!(link.to_html(), r#"<a href="/wiki/guide">Guide</a>"#);
        assert!(as_object);

        let (link, _) = wiki.link_statement(&s, "  ", LinkText::default());
        assert_eq!(link.to_html(), "<a/>");
    }

    #[test]
    fn icon_from_translations() {
        let (_, parser) = fixture();
        let wiki = WikiExtension::default();
        let translations = parser.controller().translations();
        assert_eq!(
            wiki.icon(translations.as_ref(), "star", None, "").to_html(),
            r#"<i class="icon star" title="Favourite">★</i>"#
        );
        assert_eq!(
            wiki.icon(translations.as_ref(), "gear", Some("Settings"), "big").to_html(),
            r#"<i class="big gear" title="Settings"></i>"#
        );
    }

    #[test]
    fn icon_statement_applies_description_segment() {
        let (_, parser) = fixture();
        let wiki = WikiExtension::default();
        let translations = parser.controller().translations();
        assert_eq!(
            wiki.icon_statement(translations.as_ref(), "star/Best/huge", None, "")
                .to_html(),
            r#"<i class="huge icon star" title="Best">★</i>"#
        );
    }

    #[test]
    fn options_are_validated() {
        let mut options = ExtensionOptions::new();
        options.insert("todo_class".into(), serde_json::json!("missing"));
        let wiki = WikiExtension::from_options(&options).unwrap();
        assert_eq!(wiki.todo("x").attr("class"), Some("missing"));

        options.insert("bogus".into(), serde_json::json!(1));
        assert!(matches!(
            WikiExtension::from_options(&options),
            Err(ConfigError::InvalidOptions { .. })
        ));
    }
}
