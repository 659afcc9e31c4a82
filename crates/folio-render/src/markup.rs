//! Markup conversion stages.
//!
//! After template expansion, rendered text goes through up to three stages,
//! always in this order:
//!
//! 1. **Tagged blocks**: every `<tag>...</tag>` span for the configured
//!    markdown and textile tags is replaced by its conversion.
//! 2. **Primary format**: the whole document is converted with the primary
//!    converter, if any.
//! 3. **Blank stripping**: leading whitespace and empty `<p></p>` runs are
//!    removed from the start of the document.
//!
//! Converters are chosen once, when the parser is built, through
//! [`MarkdownFlavor`] and the [`MarkupConverter`] trait.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::{Captures, Regex};
use serde::Deserialize;

use folio_textile::Textile;

/// Leading whitespace and empty paragraphs.
static LEADING_BLANKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*(?:<p>\s*</p>\s*)*").expect("blank pattern is valid"));

/// A pure `text -> html` converter.
pub trait MarkupConverter: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    fn convert(&self, text: &str) -> String;
}

/// Which Markdown extensions the converter enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkdownFlavor {
    /// CommonMark only.
    Basic,
    /// Tables, footnotes, strikethrough and heading attributes.
    #[default]
    Extra,
    /// Extra plus task lists and smart punctuation.
    Extended,
}

impl MarkdownFlavor {
    pub fn options(self) -> Options {
        let extra = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_HEADING_ATTRIBUTES;
        match self {
            MarkdownFlavor::Basic => Options::empty(),
            MarkdownFlavor::Extra => extra,
            MarkdownFlavor::Extended => {
                extra | Options::ENABLE_TASKLISTS | Options::ENABLE_SMART_PUNCTUATION
            }
        }
    }
}

/// Markdown conversion through pulldown-cmark.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownConverter {
    flavor: MarkdownFlavor,
}

impl MarkdownConverter {
    pub fn new(flavor: MarkdownFlavor) -> Self {
        Self { flavor }
    }

    pub fn flavor(&self) -> MarkdownFlavor {
        self.flavor
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new(MarkdownFlavor::default())
    }
}

impl MarkupConverter for MarkdownConverter {
    fn name(&self) -> &str {
        "markdown"
    }

    fn convert(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, self.flavor.options());
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Textile conversion through folio-textile.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextileConverter {
    textile: Textile,
}

impl TextileConverter {
    pub fn new(textile: Textile) -> Self {
        Self { textile }
    }
}

impl MarkupConverter for TextileConverter {
    fn name(&self) -> &str {
        "textile"
    }

    fn convert(&self, text: &str) -> String {
        self.textile.parse(text)
    }
}

/// The whole-document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryFormat {
    None,
    #[default]
    Markdown,
    Textile,
}

impl fmt::Display for PrimaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimaryFormat::None => "none",
            PrimaryFormat::Markdown => "markdown",
            PrimaryFormat::Textile => "textile",
        };
        f.write_str(name)
    }
}

/// The adjustable part of a parser's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSettings {
    pub primary: PrimaryFormat,
    pub markdown_tag: Option<String>,
    pub textile_tag: Option<String>,
    pub strip_blanks: bool,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            primary: PrimaryFormat::Markdown,
            markdown_tag: None,
            textile_tag: None,
            strip_blanks: true,
        }
    }
}

/// The converters used by the markup stages.
#[derive(Clone)]
pub struct Converters {
    pub markdown: Arc<dyn MarkupConverter>,
    pub textile: Arc<dyn MarkupConverter>,
}

impl Default for Converters {
    fn default() -> Self {
        Self {
            markdown: Arc::new(MarkdownConverter::default()),
            textile: Arc::new(TextileConverter::default()),
        }
    }
}

impl Converters {
    /// Runs every configured stage over rendered template output.
    pub fn apply(&self, text: &str, settings: &FormatSettings) -> Result<String, regex::Error> {
        let mut text = text.to_string();

        if let Some(tag) = &settings.markdown_tag {
            text = convert_tagged(&text, tag, self.markdown.as_ref())?;
        }
        if let Some(tag) = &settings.textile_tag {
            text = convert_tagged(&text, tag, self.textile.as_ref())?;
        }

        text = match settings.primary {
            PrimaryFormat::None => text,
            PrimaryFormat::Markdown => self.markdown.convert(&text),
            PrimaryFormat::Textile => self.textile.convert(&text),
        };

        if settings.strip_blanks {
            text = strip_leading_blanks(&text);
        }

        Ok(text)
    }
}

/// Replaces each `<tag>...</tag>` span with the conversion of its content.
///
/// A conversion that yields a single paragraph is unwrapped so the span can
/// sit inside running text.
pub fn convert_tagged(
    text: &str,
    tag: &str,
    converter: &dyn MarkupConverter,
) -> Result<String, regex::Error> {
    let tag = regex::escape(tag);
    let pattern = Regex::new(&format!(r"(?s)<{0}>(.*?)</{0}>", tag))?;
    Ok(pattern
        .replace_all(text, |caps: &Captures| {
            let html = converter.convert(&caps[1]);
            unwrap_paragraph(html.trim()).to_string()
        })
        .into_owned())
}

fn unwrap_paragraph(html: &str) -> &str {
    match html.strip_prefix("<p>").and_then(|rest| rest.strip_suffix("</p>")) {
        Some(inner) if !inner.contains("<p>") && !inner.contains("</p>") => inner,
        _ => html,
    }
}

/// Removes whitespace and empty paragraphs from the start of the document.
pub fn strip_leading_blanks(text: &str) -> String {
    LEADING_BLANKS.replace(text, "").into_owned()
}
