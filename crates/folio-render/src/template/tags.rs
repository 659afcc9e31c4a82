//! Custom block tags and source visitors.
//!
//! The template engine has no hook for new syntax, so custom tags are source
//! rewrites: a [`Tag`] receives one `{% name args %}...{% endname %}` block
//! and returns equivalent native template source. A [`Visitor`] sees the
//! whole source of every template. Both run before the engine compiles a
//! template, for the main document and for every include.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// How deep blocks of one tag may nest inside each other.
pub const MAX_NESTING: usize = 64;

/// A block statement: `{% name rest %}` with optional `-` trim markers.
static STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%(-?)\s*([A-Za-z_][A-Za-z0-9_]*)(.*?)(-?)%\}")
        .expect("statement pattern is valid")
});

/// A failure while expanding a tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{tag} tag in '{template}': {message}")]
pub struct TagError {
    pub tag: String,
    pub template: String,
    pub message: String,
}

impl TagError {
    pub fn new(tag: impl Into<String>, template: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            template: template.into(),
            message: message.into(),
        }
    }
}

/// One occurrence of a custom block tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagBlock<'a> {
    /// The tag name.
    pub name: &'a str,
    /// Everything between the tag name and `%}`, trimmed.
    pub arguments: &'a str,
    /// Source between the opening and closing statements.
    pub body: &'a str,
    /// The name of the template being expanded.
    pub template: &'a str,
}

/// A custom block tag.
pub trait Tag: Send + Sync {
    fn name(&self) -> &str;

    /// The closing statement name.
    fn end_name(&self) -> String {
        format!("end{}", self.name())
    }

    /// Returns native source replacing the whole block.
    fn expand(&self, block: &TagBlock<'_>) -> Result<String, TagError>;
}

/// A whole-source rewrite.
pub trait Visitor: Send + Sync {
    fn visit(&self, template: &str, source: &str) -> Result<String, TagError>;
}

/// A block statement found in template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement<'a> {
    pub start: usize,
    pub end: usize,
    pub name: &'a str,
    pub arguments: &'a str,
    pub trim_before: bool,
    pub trim_after: bool,
}

/// All block statements in `source`, in order.
pub fn statements(source: &str) -> Vec<Statement<'_>> {
    STATEMENT
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Statement {
                start: whole.start(),
                end: whole.end(),
                name: caps.get(2)?.as_str(),
                arguments: caps.get(3).map_or("", |m| m.as_str().trim()),
                trim_before: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
                trim_after: caps.get(4).is_some_and(|m| !m.as_str().is_empty()),
            })
        })
        .collect()
}

/// Expands every block of `tag` in `source`, outermost first.
///
/// Blocks left in an expansion are expanded in turn, up to
/// [`MAX_NESTING`] levels deep.
pub fn expand_tag(tag: &dyn Tag, template: &str, source: &str) -> Result<String, TagError> {
    expand_nested(tag, template, source, 0)
}

fn expand_nested(tag: &dyn Tag, template: &str, source: &str, depth: usize) -> Result<String, TagError> {
    let name = tag.name();
    let end_name = tag.end_name();
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    loop {
        let all = statements(rest);
        let Some(open_index) = all.iter().position(|s| s.name == name) else {
            out.push_str(rest);
            return Ok(out);
        };
        if depth >= MAX_NESTING {
            return Err(TagError::new(
                name,
                template,
                format!("blocks nested deeper than {} levels", MAX_NESTING),
            ));
        }

        let mut level = 0usize;
        let mut close = None;
        for statement in &all[open_index..] {
            if statement.name == name {
                level += 1;
            } else if statement.name == end_name {
                level -= 1;
                if level == 0 {
                    close = Some(statement);
                    break;
                }
            }
        }

        let open = &all[open_index];
        let close = close.ok_or_else(|| {
            TagError::new(name, template, format!("missing {{% {} %}}", end_name))
        })?;

        out.push_str(&rest[..open.start]);
        if open.trim_before {
            out.truncate(out.trim_end().len());
        }

        let expansion = tag.expand(&TagBlock {
            name,
            arguments: open.arguments,
            body: &rest[open.end..close.start],
            template,
        })?;
        out.push_str(&expand_nested(tag, template, &expansion, depth + 1)?);

        rest = &rest[close.end..];
        if close.trim_after {
            rest = rest.trim_start();
        }
    }
}

/// The tags and visitors applied to every template source.
#[derive(Clone, Default)]
pub struct SourceTransforms {
    tags: Vec<Arc<dyn Tag>>,
    visitors: Vec<Arc<dyn Visitor>>,
}

impl SourceTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&mut self, tag: Arc<dyn Tag>) {
        self.tags.push(tag);
    }

    pub fn add_visitor(&mut self, visitor: Arc<dyn Visitor>) {
        self.visitors.push(visitor);
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.visitors.is_empty()
    }

    /// Runs all tags in registration order, then all visitors.
    pub fn apply(&self, template: &str, source: &str) -> Result<String, TagError> {
        let mut out = source.to_string();
        for tag in &self.tags {
            out = expand_tag(tag.as_ref(), template, &out)?;
        }
        for visitor in &self.visitors {
            out = visitor.visit(template, &out)?;
        }
        Ok(out)
    }
}
