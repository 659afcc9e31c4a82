//! Structured HTML nodes returned by link and icon helpers.
//!
//! Helpers return either a markup string or an [`Element`]. Templates that
//! want to adjust a link before printing it ask for the element form and
//! read or set its attributes; printing the element yields the same markup
//! the string form would have produced.

use std::fmt;
use std::sync::{Arc, RwLock};

use minijinja::value::{Object, ObjectRepr};
use minijinja::{Error, ErrorKind, State, Value};

use crate::util::{read, write};

/// A single HTML element.
///
/// Inner content is emitted verbatim (it may already be markup). Attribute
/// values are escaped on output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    inner: Option<String>,
}

impl Element {
    /// An element with inner content.
    pub fn new(tag: impl Into<String>, inner: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            inner: Some(inner.into()),
        }
    }

    /// A self-closing element such as `<a/>`.
    pub fn empty(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            inner: None,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn inner(&self) -> Option<&str> {
        self.inner.as_deref()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Serializes the element.
    pub fn to_html(&self) -> String {
        let mut out = format!("<{}", self.tag);
        for (name, value) in &self.attributes {
            out.push_str(&format!(
                " {}=\"{}\"",
                name,
                html_escape::encode_double_quoted_attribute(value)
            ));
        }
        match &self.inner {
            Some(inner) => out.push_str(&format!(">{}</{}>", inner, self.tag)),
            None => out.push_str("/>"),
        }
        out
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

/// An [`Element`] as seen from templates.
///
/// Exposes `tag`, `html`, `text` and every attribute by name, plus the
/// `attr(name)`, `set(name, value)` and `remove(name)` methods.
#[derive(Debug)]
pub struct ElementValue {
    element: RwLock<Element>,
}

impl ElementValue {
    pub fn new(element: Element) -> Self {
        Self {
            element: RwLock::new(element),
        }
    }

    /// A copy of the current element.
    pub fn element(&self) -> Element {
        read(&self.element).clone()
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Value::from_object(ElementValue::new(element))
    }
}

impl Object for ElementValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let element = read(&self.element);
        match key.as_str()? {
            "tag" => Some(Value::from(element.tag.clone())),
            "html" => Some(Value::from_safe_string(element.to_html())),
            "text" => element.inner.clone().map(Value::from_safe_string),
            name => element.attr(name).map(Value::from),
        }
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        let name = |index: usize| -> Result<String, Error> {
            args.get(index)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::MissingArgument,
                        format!("{}() expects a string argument", method),
                    )
                })
        };

        match method {
            "attr" => Ok(read(&self.element)
                .attr(&name(0)?)
                .map(Value::from)
                .unwrap_or(Value::from(()))),
            "set" => {
                let value = args.get(1).map(|v| v.to_string()).unwrap_or_default();
                write(&self.element).set_attr(name(0)?, value);
                Ok(Value::from_dyn_object(Arc::clone(self)))
            }
            "remove" => {
                write(&self.element).remove_attr(&name(0)?);
                Ok(Value::from_dyn_object(Arc::clone(self)))
            }
            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("element has no method named {}", method),
            )),
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&read(&self.element).to_html())
    }
}
