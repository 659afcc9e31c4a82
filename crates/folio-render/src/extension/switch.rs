//! The `switch` block tag.
//!
//! ```text
//! {% switch page.kind %}
//!   {% case "guide", "howto" %}Guides
//!   {% case "faq" or "help" %}Help
//!   {% default %}Other
//! {% endswitch %}
//! ```
//!
//! A case matches when the switch value equals any of its values. Only
//! whitespace may precede the first case, and `default` must come last.
//! The block is rewritten into `with` and `if`/`elif`/`else` statements.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Extension, Registry};
use crate::error::ConfigError;
use crate::template::{statements, Statement, Tag, TagBlock, TagError};

const CASE: &str = "case";
const DEFAULT: &str = "default";

/// Installs the [`SwitchTag`].
#[derive(Debug, Default)]
pub struct SwitchExtension;

impl SwitchExtension {
    pub fn new() -> Self {
        Self
    }
}

impl Extension for SwitchExtension {
    fn name(&self) -> &str {
        "switch"
    }

    fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError> {
        registry.tag(SwitchTag::new());
        Ok(())
    }
}

/// Expands `{% switch %}` blocks.
#[derive(Debug, Default)]
pub struct SwitchTag {
    counter: AtomicUsize,
}

impl SwitchTag {
    pub fn new() -> Self {
        Self::default()
    }
}

struct Branch<'a> {
    values: Option<Vec<String>>,
    body: &'a str,
}

impl Tag for SwitchTag {
    fn name(&self) -> &str {
        "switch"
    }

    fn expand(&self, block: &TagBlock<'_>) -> Result<String, TagError> {
        let fail = |message: &str| TagError::new("switch", block.template, message);

        let subject = block.arguments.trim();
        if subject.is_empty() {
            return Err(fail("expects an expression"));
        }

        let markers = top_level_markers(block.body);
        let preamble = match markers.first() {
            Some(first) => &block.body[..first.start],
            None => block.body,
        };
        if !preamble.trim().is_empty() {
            return Err(fail("only whitespace may precede the first case"));
        }

        let mut branches: Vec<Branch<'_>> = Vec::with_capacity(markers.len());
        let mut default: Option<&str> = None;
        for (index, marker) in markers.iter().enumerate() {
            let end = markers.get(index + 1).map_or(block.body.len(), |next| next.start);
            let mut body = &block.body[marker.end..end];
            if marker.trim_after {
                body = body.trim_start();
            }
            if markers.get(index + 1).is_some_and(|next| next.trim_before) {
                body = body.trim_end();
            }

            if default.is_some() {
                return Err(fail("default must be the last branch"));
            }
            if marker.name == DEFAULT {
                default = Some(body);
                continue;
            }

            let values = case_values(marker.arguments);
            if values.is_empty() {
                return Err(fail("case expects at least one value"));
            }
            branches.push(Branch {
                values: Some(values),
                body,
            });
        }
        if let Some(body) = default {
            branches.push(Branch { values: None, body });
        }

        let var = format!("__switch_{}", self.counter.fetch_add(1, Ordering::Relaxed));
        let mut out = format!("{{% with {} = ({}) %}}", var, subject);
        let mut first = true;
        for branch in &branches {
            match &branch.values {
                Some(values) => {
                    let test = values
                        .iter()
                        .map(|value| format!("{} == ({})", var, value))
                        .collect::<Vec<_>>()
                        .join(" or ");
                    let keyword = if first { "if" } else { "elif" };
                    out.push_str(&format!("{{% {} {} %}}", keyword, test));
                    first = false;
                }
                None if first => {}
                None => out.push_str("{% else %}"),
            }
            out.push_str(branch.body);
        }
        if !first {
            out.push_str("{% endif %}");
        }
        out.push_str("{% endwith %}");
        Ok(out)
    }
}

/// `case` and `default` statements not nested in an inner switch.
fn top_level_markers(body: &str) -> Vec<Statement<'_>> {
    let mut depth = 0usize;
    let mut markers = Vec::new();
    for statement in statements(body) {
        match statement.name {
            "switch" => depth += 1,
            "endswitch" => depth = depth.saturating_sub(1),
            CASE | DEFAULT if depth == 0 => markers.push(statement),
            _ => {}
        }
    }
    markers
}

/// Splits case arguments on top-level commas and the `or` keyword.
fn case_values(arguments: &str) -> Vec<String> {
    let chars: Vec<char> = arguments.chars().collect();
    let mut values = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    current.push(*next);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => flush(&mut values, &mut current),
            'o' if depth == 0 && is_or_keyword(&chars, i) => {
                flush(&mut values, &mut current);
                i += 1;
            }
            _ => current.push(c),
        }
        i += 1;
    }
    flush(&mut values, &mut current);
    values
}

fn is_or_keyword(chars: &[char], at: usize) -> bool {
    chars.get(at + 1) == Some(&'r')
        && (at == 0 || chars[at - 1].is_whitespace())
        && chars.get(at + 2).map_or(true, |c| c.is_whitespace())
}

fn flush(values: &mut Vec<String>, current: &mut String) {
    let value = current.trim();
    if !value.is_empty() {
        values.push(value.to_string());
    }
    current.clear();
}
