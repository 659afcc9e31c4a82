//! Per-render context.
//!
//! A [`Context`] is built for exactly one render of one topic. It binds the
//! parser, the topic and the topic's category (resolved once, at
//! construction) into a [`RenderScope`], and carries the variables handed to
//! the template engine.
//!
//! Variables are seeded in this order, later writes winning:
//!
//! 1. the parser's global variables;
//! 2. self-references configured by [`ContextOptions`];
//! 3. whatever each extension's `setup_context` hook sets.
//!
//! The render scope travels with the variables under [`SCOPE_VAR`], so
//! template callables resolve "the current topic" against the render that
//! called them rather than against shared parser state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr};
use minijinja::{State, Value};
use serde::{Deserialize, Deserializer};

use crate::content::{Category, Topic};
use crate::error::WikiError;
use crate::parser::Parser;
use crate::value::{CategoryValue, ParserValue, TopicValue};

/// The variable holding the [`RenderScope`] during a render.
pub const SCOPE_VAR: &str = "__folio_scope";

/// Template variables.
pub type Variables = BTreeMap<String, Value>;

/// How a self-reference is exposed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelfRef {
    /// Not exposed.
    #[default]
    Off,
    /// Exposed under the option's own name.
    Default,
    /// Exposed under a custom name.
    Named(String),
}

impl SelfRef {
    /// `true` selects the default name, a non-empty string a custom name;
    /// anything else turns the reference off.
    pub fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(true) => SelfRef::Default,
            serde_json::Value::String(name) if !name.is_empty() => SelfRef::Named(name.clone()),
            _ => SelfRef::Off,
        }
    }

    /// The variable name to use, if any.
    pub fn variable<'a>(&'a self, default: &'a str) -> Option<&'a str> {
        match self {
            SelfRef::Off => None,
            SelfRef::Default => Some(default),
            SelfRef::Named(name) => Some(name),
        }
    }
}

impl<'de> Deserialize<'de> for SelfRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(SelfRef::from_value(&value))
    }
}

/// Which self-references a context exposes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    pub this: SelfRef,
    pub parser: SelfRef,
    pub category: SelfRef,
    pub topic: SelfRef,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            this: SelfRef::Default,
            parser: SelfRef::Off,
            category: SelfRef::Off,
            topic: SelfRef::Off,
        }
    }
}

impl ContextOptions {
    /// The option for a self-reference key.
    pub fn get(&self, key: &str) -> Option<&SelfRef> {
        match key {
            "this" => Some(&self.this),
            "parser" => Some(&self.parser),
            "category" => Some(&self.category),
            "topic" => Some(&self.topic),
            _ => None,
        }
    }
}

type SelfRefValue = fn(&RenderScope) -> Value;

/// Self-reference keys and how each one is exposed.
const SELF_REFS: [(&str, SelfRefValue); 4] = [
    ("this", RenderScope::to_value),
    ("parser", RenderScope::parser_value),
    ("category", RenderScope::category_value),
    ("topic", RenderScope::topic_value),
];

/// The parser, topic and category of one render.
///
/// A scope also carries the compound names of the renders it is nested in,
/// outermost first, so a document cannot render itself.
#[derive(Clone)]
pub struct RenderScope {
    parser: Parser,
    topic: Arc<dyn Topic>,
    category: Arc<dyn Category>,
    stack: Arc<Vec<String>>,
}

impl fmt::Debug for RenderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScope")
            .field("topic", &self.topic.ident())
            .field("category", &self.category.ident())
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl RenderScope {
    pub fn new(parser: Parser, topic: Arc<dyn Topic>, category: Arc<dyn Category>) -> Self {
        Self {
            parser,
            topic,
            category,
            stack: Arc::new(Vec::new()),
        }
    }

    /// Names of the documents being rendered around this one.
    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    /// This scope with `name` pushed onto its render stack.
    pub(crate) fn entered(&self, name: &str) -> RenderScope {
        let mut stack = Vec::with_capacity(self.stack.len() + 1);
        stack.extend(self.stack.iter().cloned());
        stack.push(name.to_string());
        RenderScope {
            stack: Arc::new(stack),
            ..self.clone()
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn topic(&self) -> &Arc<dyn Topic> {
        &self.topic
    }

    pub fn category(&self) -> &Arc<dyn Category> {
        &self.category
    }

    /// The named category, or the current one when `ident` is `None`.
    pub fn find_category(&self, ident: Option<&str>) -> Option<Arc<dyn Category>> {
        match ident {
            None => Some(Arc::clone(&self.category)),
            Some(ident) => self.parser.category(ident),
        }
    }

    /// The named topic, looked up in the named category or the current one.
    /// With no ident, the current topic.
    pub fn find_topic(&self, ident: Option<&str>, category: Option<&str>) -> Option<Arc<dyn Topic>> {
        match ident {
            None => Some(Arc::clone(&self.topic)),
            Some(ident) => self.find_category(category)?.topic(ident),
        }
    }

    /// The scope as a template value.
    pub fn to_value(&self) -> Value {
        Value::from_object(self.clone())
    }

    fn parser_value(&self) -> Value {
        Value::from_object(ParserValue::new(self.parser.clone()))
    }

    fn category_value(&self) -> Value {
        CategoryValue::new(Arc::clone(&self.category), self.parser.clone()).into()
    }

    fn topic_value(&self) -> Value {
        TopicValue::new(Arc::clone(&self.topic), self.parser.clone()).into()
    }

    /// The scope of the render the engine is running, if any.
    pub fn from_state(state: &State<'_, '_>) -> Option<Arc<RenderScope>> {
        state.lookup(SCOPE_VAR)?.downcast_object::<RenderScope>()
    }
}

impl Object for RenderScope {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "parser" => Some(self.parser_value()),
            "topic" => Some(self.topic_value()),
            "category" => Some(self.category_value()),
            _ => None,
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<render {}/{}>", self.category.ident(), self.topic.ident())
    }
}

/// The state of one render.
pub struct Context {
    scope: RenderScope,
    variables: Variables,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("scope", &self.scope)
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Context {
    /// Binds a topic and its category, then seeds variables from `globals`
    /// and the self-reference `options`.
    ///
    /// Fails when the topic's category cannot be resolved.
    pub fn new(
        parser: Parser,
        topic: Arc<dyn Topic>,
        globals: &Variables,
        options: &ContextOptions,
    ) -> Result<Self, WikiError> {
        let category = topic.category().ok_or_else(|| WikiError::MissingCategory {
            topic: topic.ident().to_string(),
        })?;

        let scope = RenderScope::new(parser, topic, category);
        let mut variables = globals.clone();
        for (key, value) in SELF_REFS {
            let name = options.get(key).and_then(|option| option.variable(key));
            if let Some(name) = name {
                variables.insert(name.to_string(), value(&scope));
            }
        }

        Ok(Self { scope, variables })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// A copy of the variables. Changing it does not affect the context.
    pub fn snapshot(&self) -> Variables {
        self.variables.clone()
    }

    pub fn scope(&self) -> &RenderScope {
        &self.scope
    }

    pub fn parser(&self) -> &Parser {
        &self.scope.parser
    }

    pub fn topic(&self) -> &Arc<dyn Topic> {
        &self.scope.topic
    }

    pub fn category(&self) -> &Arc<dyn Category> {
        &self.scope.category
    }

    /// Nests this render inside `parent`.
    pub fn inherit(&mut self, parent: &RenderScope) {
        self.scope.stack = Arc::clone(&parent.stack);
    }

    /// Renders the bound topic.
    pub fn render(&self) -> Result<String, WikiError> {
        self.scope.parser.parse(self)
    }
}
