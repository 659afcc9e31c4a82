//! Template views of parsers and content.
//!
//! Topics, categories and parsers are exposed to templates as objects so
//! that templates can navigate the content tree (`category.topic("faq")`),
//! read attributes (`topic.name`) and render other documents
//! (`topic.content()`).

use std::fmt;
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr};
use minijinja::{Error, ErrorKind, State, Value};

use crate::content::{Category, ErrorFlags, Topic};
use crate::context::RenderScope;
use crate::parser::Parser;

/// Renders `topic` nested in the render the engine is running.
fn render_nested(parser: &Parser, state: &State<'_, '_>, topic: Arc<dyn Topic>) -> Result<Value, Error> {
    let html = match RenderScope::from_state(state) {
        Some(parent) => parser.render_within(topic, &parent),
        None => parser.render(topic),
    }
    .map_err(|err| {
        Error::new(ErrorKind::InvalidOperation, "failed to render document").with_source(err)
    })?;
    Ok(Value::from_safe_string(html))
}

fn text_of(content: &dyn crate::content::Content) -> Value {
    Value::from(
        content
            .text(ErrorFlags::NONE, ErrorFlags::ALL)
            .unwrap_or_default(),
    )
}

/// A topic as seen from templates.
///
/// Attributes: `ident`, `name`, `published`, `text`, `category`.
/// Methods: `content()` renders the topic.
pub struct TopicValue {
    topic: Arc<dyn Topic>,
    parser: Parser,
}

impl fmt::Debug for TopicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TopicValue").field(&self.topic.ident()).finish()
    }
}

impl TopicValue {
    pub fn new(topic: Arc<dyn Topic>, parser: Parser) -> Self {
        Self { topic, parser }
    }

    pub fn topic(&self) -> &Arc<dyn Topic> {
        &self.topic
    }
}

impl From<TopicValue> for Value {
    fn from(topic: TopicValue) -> Self {
        Value::from_object(topic)
    }
}

impl Object for TopicValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "ident" => Some(Value::from(self.topic.ident())),
            "name" => Some(Value::from(self.topic.name())),
            "published" => Some(Value::from(self.topic.published())),
            "text" => Some(text_of(self.topic.as_ref())),
            "category" => self
                .topic
                .category()
                .map(|category| CategoryValue::new(category, self.parser.clone()).into()),
            _ => None,
        }
    }

    fn call_method(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        method: &str,
        _args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "content" => render_nested(&self.parser, state, Arc::clone(&self.topic)),
            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("topic has no method named {}", method),
            )),
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic.name())
    }
}

/// A category as seen from templates.
///
/// Attributes: `ident`, `name`, `published`, `text`.
/// Methods: `topic(ident)`, `topics()`.
pub struct CategoryValue {
    category: Arc<dyn Category>,
    parser: Parser,
}

impl fmt::Debug for CategoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CategoryValue")
            .field(&self.category.ident())
            .finish()
    }
}

impl CategoryValue {
    pub fn new(category: Arc<dyn Category>, parser: Parser) -> Self {
        Self { category, parser }
    }

    pub fn category(&self) -> &Arc<dyn Category> {
        &self.category
    }

    fn topic_value(&self, topic: Arc<dyn Topic>) -> Value {
        TopicValue::new(topic, self.parser.clone()).into()
    }
}

impl From<CategoryValue> for Value {
    fn from(category: CategoryValue) -> Self {
        Value::from_object(category)
    }
}

impl Object for CategoryValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "ident" => Some(Value::from(self.category.ident())),
            "name" => Some(Value::from(self.category.name())),
            "published" => Some(Value::from(self.category.published())),
            "text" => Some(text_of(self.category.as_ref())),
            _ => None,
        }
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "topic" => {
                let ident = args.first().and_then(Value::as_str).ok_or_else(|| {
                    Error::new(ErrorKind::MissingArgument, "topic() expects a topic ident")
                })?;
                Ok(self
                    .category
                    .topic(ident)
                    .map(|topic| self.topic_value(topic))
                    .unwrap_or(Value::from(())))
            }
            "topics" => Ok(Value::from(
                self.category
                    .topics()
                    .into_iter()
                    .map(|topic| self.topic_value(topic))
                    .collect::<Vec<_>>(),
            )),
            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("category has no method named {}", method),
            )),
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category.name())
    }
}

/// A parser as seen from templates.
///
/// Attributes: `format`, `markdown_tag`, `textile_tag`, `strip_blanks`.
/// Methods: `category(ident)`, `topic(category, ident)`,
/// `render(category, ident)`.
#[derive(Debug)]
pub struct ParserValue {
    parser: Parser,
}

impl ParserValue {
    pub fn new(parser: Parser) -> Self {
        Self { parser }
    }

    fn string_arg<'a>(args: &'a [Value], index: usize, method: &str) -> Result<&'a str, Error> {
        args.get(index).and_then(Value::as_str).ok_or_else(|| {
            Error::new(
                ErrorKind::MissingArgument,
                format!("{}() expects a string at position {}", method, index + 1),
            )
        })
    }
}

impl Object for ParserValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let settings = self.parser.format();
        match key.as_str()? {
            "format" => Some(Value::from(settings.primary.to_string())),
            "markdown_tag" => Some(settings.markdown_tag.map(Value::from).unwrap_or(Value::from(()))),
            "textile_tag" => Some(settings.textile_tag.map(Value::from).unwrap_or(Value::from(()))),
            "strip_blanks" => Some(Value::from(settings.strip_blanks)),
            _ => None,
        }
    }

    fn call_method(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "category" => {
                let ident = Self::string_arg(args, 0, method)?;
                Ok(self
                    .parser
                    .category(ident)
                    .map(|category| CategoryValue::new(category, self.parser.clone()).into())
                    .unwrap_or(Value::from(())))
            }
            "topic" => {
                let category = Self::string_arg(args, 0, method)?;
                let ident = Self::string_arg(args, 1, method)?;
                Ok(self
                    .parser
                    .topic_in(category, ident)
                    .map(|topic| TopicValue::new(topic, self.parser.clone()).into())
                    .unwrap_or(Value::from(())))
            }
            "render" => {
                let category = Self::string_arg(args, 0, method)?;
                let ident = Self::string_arg(args, 1, method)?;
                let topic = self.parser.topic_in(category, ident).ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidOperation,
                        format!("no topic '{}' in category '{}'", ident, category),
                    )
                })?;
                render_nested(&self.parser, state, topic)
            }
            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("parser has no method named {}", method),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryController, MemoryStore, Record};
    use crate::{ParserBuilder, ParserConfig};
    use minijinja::{context, Environment};

    fn fixture() -> (MemoryStore, Parser) {
        let store = MemoryStore::new();
        store.insert_category(Record::new("guide", "Guide").text("category text"));
        store.insert_topic("guide", Record::new("intro", "Introduction").text("*hi*"));
        store.insert_topic("guide", Record::new("draft", "Draft").published(false));
        let parser = ParserBuilder::new(ParserConfig::default())
            .controller(MemoryController::new())
            .categories(store.clone())
            .extensions(Vec::new())
            .build()
            .unwrap();
        (store, parser)
    }

    fn render(template: &str, value: Value) -> String {
        Environment::new()
            .render_str(template, context! { v => value })
            .unwrap()
    }

    #[test]
    fn test_topic_attributes() {
        let (store, parser) = fixture();
        let topic = store.memory_topic("guide", "intro").unwrap();
        let value: Value = TopicValue::new(topic, parser).into();
        assert_eq!(
            render("{{ v.ident }}|{{ v.name }}|{{ 'yes' if v.published else 'no' }}|{{ v.category.name }}", value),
            "intro|Introduction|yes|Guide"
        );
    }

    #[test]
    fn test_category_navigation() {
        let (store, parser) = fixture();
        let category = store.memory_category("guide").unwrap();
        let value: Value = CategoryValue::new(category, parser).into();
        assert_eq!(
            render("{{ v.topic('intro').name }}|{% if v.topic('nope') is none %}none{% endif %}", value.clone()),
            "Introduction|none"
        );
        assert_eq!(
            render("{% for t in v.topics() %}{{ t.ident }} {% endfor %}", value),
            "draft intro "
        );
    }

    #[test]
    fn test_parser_render_method() {
        let (_, parser) = fixture();
        let value = Value::from_object(ParserValue::new(parser));
        assert_eq!(
            render("{{ v.format }}|{{ v.render('guide', 'intro') }}", value),
            "markdown|<p>category text\n<em>hi</em></p>\n"
        );
    }

    #[test]
    fn test_parser_lookup_misses_are_none() {
        let (_, parser) = fixture();
        let value = Value::from_object(ParserValue::new(parser));
        assert_eq!(
            render("{% if v.category('nope') is none %}none{% endif %}|{% if v.topic('guide', 'nope') is none %}none{% endif %}", value),
            "none|none"
        );
    }
}
