//! `markdown` and `textile` filters.
//!
//! Both run the rendering parser's converters, so a template gets the same
//! Markdown flavor as the document around it.

use minijinja::{Error, Value};

use super::call::{required_string, CallScope};
use super::{Extension, Registry, Safety};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, Default)]
pub struct FormattingExtension;

impl FormattingExtension {
    fn markdown(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let text = required_string(args, 0, "text")?;
        let html = render.parser().converters().markdown.convert(&text);
        Ok(Value::from_safe_string(html))
    }

    fn textile(&self, scope: &CallScope<'_>, args: &[Value]) -> Result<Value, Error> {
        let render = scope.require_render()?;
        let text = required_string(args, 0, "text")?;
        let html = render.parser().converters().textile.convert(&text);
        Ok(Value::from_safe_string(html))
    }
}

impl Extension for FormattingExtension {
    fn name(&self) -> &str {
        "formatting"
    }

    fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError> {
        registry
            .filter("markdown")
            .method(Self::markdown)
            .safe(Safety::All)
            .needs_context()
            .add()?
            .filter("textile")
            .method(Self::textile)
            .safe(Safety::All)
            .needs_context()
            .add()?;
        Ok(())
    }
}
