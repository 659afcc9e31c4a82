//! Textile markup to HTML conversion.
//!
//! This crate converts [Textile](https://textile-lang.com/) markup into HTML.
//! It is deliberately a pure function of its input: no I/O, no global state,
//! and the same input always yields the same output.
//!
//! # Example
//!
//! ```rust
//! use folio_textile::Textile;
//!
//! let textile = Textile::new();
//! assert_eq!(textile.parse("h1. Welcome"), "<h1>Welcome</h1>");
//! assert_eq!(
//!     textile.parse("Some *strong* words"),
//!     "<p>Some <strong>strong</strong> words</p>"
//! );
//! ```
//!
//! # Supported Syntax
//!
//! Blocks are separated by blank lines. A block may start with a signature:
//!
//! | Signature | Output |
//! |-----------|--------|
//! | `h1.` .. `h6.` | Heading |
//! | `p.` | Paragraph (the default for unsigned blocks) |
//! | `bq.` | Block quote |
//! | `bc.` | Code block (content is escaped) |
//! | `pre.` | Preformatted block (content is escaped) |
//! | `notextile.` | Raw passthrough |
//!
//! Signatures accept a `(class#id)` modifier, e.g. `p(intro#lead). Hello`.
//! Blocks made of `*` / `#` prefixed lines become lists, blocks made of
//! `|`-delimited lines become tables.
//!
//! Blocks that already start with a block-level HTML tag are passed through
//! untouched, which lets Textile documents embed HTML produced by other
//! converters without it being re-wrapped or re-formatted.
//!
//! Inline markup is only applied to text outside HTML tags:
//! `*strong*`, `_em_`, `**b**`, `__i__`, `??cite??`, `-del-`, `+ins+`,
//! `^sup^`, `~sub~`, `%span%`, `@code@`, `"text(title)":url` links and
//! `!src(alt)!` images.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// HTML elements that start a block which is passed through unchanged.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "iframe",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "script",
    "section",
    "style",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Phrase modifiers in application order. Doubled markers come first so that
/// `**b**` is not consumed as two `*strong*` spans.
const PHRASES: &[(&str, &str)] = &[
    ("**", "b"),
    ("__", "i"),
    ("??", "cite"),
    ("*", "strong"),
    ("_", "em"),
    ("-", "del"),
    ("+", "ins"),
    ("^", "sup"),
    ("~", "sub"),
    ("%", "span"),
];

const GLYPHS: &[(&str, &str)] = &[
    (" -- ", " &#8212; "),
    ("...", "&#8230;"),
    ("(tm)", "&#8482;"),
    ("(TM)", "&#8482;"),
    ("(c)", "&#169;"),
    ("(C)", "&#169;"),
    ("(r)", "&#174;"),
    ("(R)", "&#174;"),
];

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

static BLOCK_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(h[1-6]|p|bq|bc|pre|notextile)(\([^)\n]*\))?\.\s(.*)$")
        .expect("block signature pattern is valid")
});

static HTML_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</?([A-Za-z][A-Za-z0-9]*)").expect("html start pattern is valid"));

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([*#]+)\s+(.*)$").expect("list item pattern is valid"));

static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"\n]+?)":([^\s<"]+)"#).expect("link pattern is valid")
});

static LINK_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(([^)]+)\)$").expect("link title pattern is valid"));

static IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!([^\s!()]+)(?:\(([^)]*)\))?!").expect("image pattern is valid")
});

/// A Textile to HTML converter.
///
/// The converter is cheap to construct and holds only formatting switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Textile {
    line_breaks: bool,
    glyphs: bool,
}

impl Default for Textile {
    fn default() -> Self {
        Self {
            line_breaks: true,
            glyphs: true,
        }
    }
}

impl Textile {
    /// Creates a converter with line breaks and glyph substitution enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether single newlines inside a paragraph become `<br />`.
    pub fn line_breaks(mut self, enabled: bool) -> Self {
        self.line_breaks = enabled;
        self
    }

    /// Whether typographic glyphs (`--`, `...`, `(c)`, ...) are substituted.
    pub fn glyphs(mut self, enabled: bool) -> Self {
        self.glyphs = enabled;
        self
    }

    /// Converts Textile markup into HTML.
    pub fn parse(&self, input: &str) -> String {
        let normalized = input.replace("\r\n", "\n");
        split_blocks(&normalized)
            .iter()
            .map(|block| self.block(block))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn block(&self, block: &str) -> String {
        if is_html_block(block) {
            return block.to_string();
        }

        if let Some(caps) = BLOCK_SIGNATURE.captures(block) {
            let tag = &caps[1];
            let attrs = caps.get(2).map(|m| attributes(m.as_str())).unwrap_or_default();
            let content = &caps[3];
            return match tag {
                "p" => format!("<p{}>{}</p>", attrs, self.inline(content)),
                "bq" => format!(
                    "<blockquote{}>\n<p>{}</p>\n</blockquote>",
                    attrs,
                    self.inline(content)
                ),
                "bc" => format!(
                    "<pre{}><code>{}</code></pre>",
                    attrs,
                    html_escape::encode_text(content)
                ),
                "pre" => format!("<pre{}>{}</pre>", attrs, html_escape::encode_text(content)),
                "notextile" => content.to_string(),
                heading => format!("<{0}{1}>{2}</{0}>", heading, attrs, self.inline(content)),
            };
        }

        if is_list(block) {
            return self.list(block);
        }

        if is_table(block) {
            return self.table(block);
        }

        format!("<p>{}</p>", self.inline(block))
    }

    fn list(&self, block: &str) -> String {
        let mut out = String::new();
        let mut stack: Vec<&'static str> = Vec::new();

        for line in block.lines() {
            let Some(caps) = LIST_ITEM.captures(line) else {
                continue;
            };
            let marker = caps.get(1).map_or("", |m| m.as_str());
            let depth = marker.len();
            let kind = if marker.ends_with('#') { "ol" } else { "ul" };
            let text = caps.get(2).map_or("", |m| m.as_str());

            if depth > stack.len() {
                while stack.len() < depth {
                    if !stack.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&format!("<{}>\n", kind));
                    stack.push(kind);
                }
            } else {
                while stack.len() > depth {
                    if let Some(open) = stack.pop() {
                        out.push_str(&format!("</li>\n</{}>\n", open));
                    }
                }
                out.push_str("</li>\n");
            }
            out.push_str(&format!("\t<li>{}", self.inline(text)));
        }

        while let Some(open) = stack.pop() {
            out.push_str(&format!("</li>\n</{}>\n", open));
        }

        out.trim_end().to_string()
    }

    fn table(&self, block: &str) -> String {
        let mut out = String::from("<table>\n");
        for line in block.lines() {
            let row = line.trim();
            let row = row.strip_prefix('|').unwrap_or(row);
            let row = row.strip_suffix('|').unwrap_or(row);
            out.push_str("\t<tr>\n");
            for cell in row.split('|') {
                match cell.strip_prefix("_.") {
                    Some(header) => {
                        out.push_str(&format!("\t\t<th>{}</th>\n", self.inline(header.trim())))
                    }
                    None => out.push_str(&format!("\t\t<td>{}</td>\n", self.inline(cell.trim()))),
                }
            }
            out.push_str("\t</tr>\n");
        }
        out.push_str("</table>");
        out
    }

    /// Applies inline markup to a run of text.
    fn inline(&self, text: &str) -> String {
        let mut protected: Vec<String> = Vec::new();

        // Code spans may contain angle brackets, so they are cut out before
        // the text is split around tags.
        let mut out = phrase(text, "@", |inner| {
            protected.push(format!("<code>{}</code>", html_escape::encode_text(inner)));
            format!(
                "{}{}{}",
                PLACEHOLDER_OPEN,
                protected.len() - 1,
                PLACEHOLDER_CLOSE
            )
        });

        out = map_text(&out, images);
        out = map_text(&out, links);

        if self.glyphs {
            out = map_text(&out, glyphs);
        }

        for (marker, tag) in PHRASES {
            out = map_text(&out, |segment| {
                phrase(segment, marker, |inner| format!("<{0}>{1}</{0}>", tag, inner))
            });
        }

        if self.line_breaks {
            out = out.replace('\n', "<br />\n");
        }

        restore(&out, &protected)
    }
}

/// Splits the input into blocks separated by blank lines.
fn split_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in input.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    blocks
}

fn is_html_block(block: &str) -> bool {
    let trimmed = block.trim_start();
    if trimmed.starts_with("<!--") {
        return true;
    }
    HTML_START
        .captures(trimmed)
        .map(|caps| BLOCK_TAGS.contains(&caps[1].to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_list(block: &str) -> bool {
    block.lines().all(|line| LIST_ITEM.is_match(line))
}

fn is_table(block: &str) -> bool {
    block.lines().all(|line| {
        let line = line.trim();
        line.len() > 1 && line.starts_with('|') && line.ends_with('|')
    })
}

/// Renders a `(class#id)` block modifier as HTML attributes.
fn attributes(modifier: &str) -> String {
    let inner = modifier.trim_start_matches('(').trim_end_matches(')').trim();
    let (class, id) = match inner.split_once('#') {
        Some((class, id)) => (class.trim(), id.trim()),
        None => (inner, ""),
    };

    let mut attrs = String::new();
    if !class.is_empty() {
        attrs.push_str(&format!(
            " class=\"{}\"",
            html_escape::encode_double_quoted_attribute(class)
        ));
    }
    if !id.is_empty() {
        attrs.push_str(&format!(
            " id=\"{}\"",
            html_escape::encode_double_quoted_attribute(id)
        ));
    }
    attrs
}

/// Applies `f` to every run of text that lies outside an HTML tag.
fn map_text(input: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = find_tag_start(rest) {
        let (text, tail) = rest.split_at(start);
        if !text.is_empty() {
            out.push_str(&f(text));
        }
        match tail.find('>') {
            Some(end) => {
                out.push_str(&tail[..=end]);
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(&f(tail));
                rest = "";
            }
        }
    }

    if !rest.is_empty() {
        out.push_str(&f(rest));
    }
    out
}

fn find_tag_start(text: &str) -> Option<usize> {
    text.char_indices()
        .find(|&(i, c)| {
            c == '<'
                && text[i + 1..]
                    .chars()
                    .next()
                    .is_some_and(|next| next.is_ascii_alphabetic() || next == '/' || next == '!')
        })
        .map(|(i, _)| i)
}

/// Replaces every `marker`-delimited span with the output of `render`.
///
/// A span opens after start-of-text, whitespace or opening punctuation, must
/// not begin or end with whitespace, and closes before end-of-text,
/// whitespace or closing punctuation.
fn phrase(text: &str, marker: &str, mut render: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(rel) = text[pos..].find(marker) {
        let open = pos + rel;
        let inner_start = open + marker.len();

        if opens_phrase(text, open, inner_start) {
            if let Some(close) = find_close(text, inner_start, marker) {
                out.push_str(&text[pos..open]);
                out.push_str(&render(&text[inner_start..close]));
                pos = close + marker.len();
                continue;
            }
        }

        out.push_str(&text[pos..inner_start]);
        pos = inner_start;
    }

    out.push_str(&text[pos..]);
    out
}

fn opens_phrase(text: &str, open: usize, inner_start: usize) -> bool {
    let before_ok = text[..open]
        .chars()
        .next_back()
        .map_or(true, |c| c.is_whitespace() || "([{\"'".contains(c));
    let first_inner = text[inner_start..].chars().next();
    before_ok && first_inner.is_some_and(|c| !c.is_whitespace())
}

fn find_close(text: &str, from: usize, marker: &str) -> Option<usize> {
    let mut search = from;
    while let Some(rel) = text[search..].find(marker) {
        let idx = search + rel;
        let before = text[..idx].chars().next_back();
        let after = text[idx + marker.len()..].chars().next();
        if idx > from
            && before.is_some_and(|c| !c.is_whitespace())
            && after.map_or(true, |c| c.is_whitespace() || ".,;:!?)]}\"'".contains(c))
        {
            return Some(idx);
        }
        search = idx + marker.len();
    }
    None
}

fn links(text: &str) -> String {
    LINK.replace_all(text, |caps: &Captures| {
        let label = &caps[1];
        let raw_url = &caps[2];
        let url = raw_url.trim_end_matches(|c: char| ".,;:!?)".contains(c));
        let trailing = &raw_url[url.len()..];

        let (label, title) = match LINK_TITLE.captures(label) {
            Some(t) => (t[1].to_string(), Some(t[2].to_string())),
            None => (label.to_string(), None),
        };

        let title_attr = title
            .map(|t| format!(" title=\"{}\"", html_escape::encode_double_quoted_attribute(&t)))
            .unwrap_or_default();

        format!(
            "<a href=\"{}\"{}>{}</a>{}",
            html_escape::encode_double_quoted_attribute(url),
            title_attr,
            label,
            trailing
        )
    })
    .into_owned()
}

fn images(text: &str) -> String {
    IMAGE
        .replace_all(text, |caps: &Captures| {
            let alt = caps.get(2).map_or("", |m| m.as_str());
            format!(
                "<img src=\"{}\" alt=\"{}\" />",
                html_escape::encode_double_quoted_attribute(&caps[1]),
                html_escape::encode_double_quoted_attribute(alt)
            )
        })
        .into_owned()
}

fn glyphs(text: &str) -> String {
    GLYPHS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Puts protected fragments back in place of their placeholders.
fn restore(text: &str, protected: &[String]) -> String {
    if protected.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + PLACEHOLDER_OPEN.len_utf8()..];
        match after.find(PLACEHOLDER_CLOSE) {
            Some(end) => {
                match after[..end].parse::<usize>().ok().and_then(|i| protected.get(i)) {
                    Some(fragment) => out.push_str(fragment),
                    None => out.push_str(&after[..end]),
                }
                rest = &after[end + PLACEHOLDER_CLOSE.len_utf8()..];
            }
            None => {
                out.push_str(after);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textile(input: &str) -> String {
        Textile::new().parse(input)
    }

    // ==================== Block Tests ====================

    mod blocks {
        use super::*;

        #[test]
        fn plain_paragraph() {
            assert_eq!(textile("hello world"), "<p>hello world</p>");
        }

        #[test]
        fn paragraphs_split_on_blank_lines() {
            assert_eq!(textile("one\n\ntwo"), "<p>one</p>\n<p>two</p>");
        }

        #[test]
        fn whitespace_only_line_separates_blocks() {
            assert_eq!(textile("one\n   \ntwo"), "<p>one</p>\n<p>two</p>");
        }

        #[test]
        fn single_newline_is_line_break() {
            assert_eq!(
                textile("line one\nline two"),
                "<p>line one<br />\nline two</p>"
            );
        }

        #[test]
        fn line_breaks_can_be_disabled() {
            let textile = Textile::new().line_breaks(false);
            assert_eq!(textile.parse("a\nb"), "<p>a\nb</p>");
        }

        #[test]
        fn headings() {
            assert_eq!(textile("h1. Title"), "<h1>Title</h1>");
            assert_eq!(textile("h3. Sub *bold*"), "<h3>Sub <strong>bold</strong></h3>");
        }

        #[test]
        fn explicit_paragraph_with_modifier() {
            assert_eq!(
                textile("p(intro#lead). Hi"),
                "<p class=\"intro\" id=\"lead\">Hi</p>"
            );
        }

        #[test]
        fn id_only_modifier() {
            assert_eq!(textile("h2(#top). Top"), "<h2 id=\"top\">Top</h2>");
        }

        #[test]
        fn block_quote() {
            assert_eq!(
                textile("bq. Quoted"),
                "<blockquote>\n<p>Quoted</p>\n</blockquote>"
            );
        }

        #[test]
        fn code_block_is_escaped() {
            assert_eq!(
                textile("bc. a < b && *c*"),
                "<pre><code>a &lt; b &amp;&amp; *c*</code></pre>"
            );
        }

        #[test]
        fn pre_block_is_escaped() {
            assert_eq!(textile("pre. <tag>"), "<pre>&lt;tag&gt;</pre>");
        }

        #[test]
        fn notextile_passes_raw() {
            assert_eq!(textile("notextile. *raw*"), "*raw*");
        }

        #[test]
        fn html_block_passes_through() {
            assert_eq!(textile("<div>keep *this*</div>"), "<div>keep *this*</div>");
        }

        #[test]
        fn multi_line_html_block_passes_through() {
            let html = "<h1>Head</h1>\n<p><em>em</em></p>";
            assert_eq!(textile(html), html);
        }

        #[test]
        fn html_comment_passes_through() {
            assert_eq!(textile("<!-- note -->"), "<!-- note -->");
        }

        #[test]
        fn inline_html_start_is_still_a_paragraph() {
            assert_eq!(
                textile("<strong>b</strong> text"),
                "<p><strong>b</strong> text</p>"
            );
        }

        #[test]
        fn crlf_input_is_normalized() {
            assert_eq!(textile("one\r\n\r\ntwo"), "<p>one</p>\n<p>two</p>");
        }

        #[test]
        fn empty_input() {
            assert_eq!(textile(""), "");
        }
    }

    // ==================== List and Table Tests ====================

    mod structures {
        use super::*;

        #[test]
        fn bullet_list() {
            assert_eq!(
                textile("* one\n* two"),
                "<ul>\n\t<li>one</li>\n\t<li>two</li>\n</ul>"
            );
        }

        #[test]
        fn numbered_list() {
            assert_eq!(
                textile("# one\n# two"),
                "<ol>\n\t<li>one</li>\n\t<li>two</li>\n</ol>"
            );
        }

        #[test]
        fn nested_list() {
            assert_eq!(
                textile("* a\n** b\n* c"),
                "<ul>\n\t<li>a\n<ul>\n\t<li>b</li>\n</ul>\n</li>\n\t<li>c</li>\n</ul>"
            );
        }

        #[test]
        fn table_with_header() {
            assert_eq!(
                textile("|_. a|_. b|\n|1|2|"),
                "<table>\n\t<tr>\n\t\t<th>a</th>\n\t\t<th>b</th>\n\t</tr>\n\t<tr>\n\t\t<td>1</td>\n\t\t<td>2</td>\n\t</tr>\n</table>"
            );
        }
    }

    // ==================== Inline Tests ====================

    mod inline {
        use super::*;

        #[test]
        fn strong_and_emphasis() {
            assert_eq!(
                textile("*a* and _b_"),
                "<p><strong>a</strong> and <em>b</em></p>"
            );
        }

        #[test]
        fn doubled_markers() {
            assert_eq!(textile("**a** __b__"), "<p><b>a</b> <i>b</i></p>");
        }

        #[test]
        fn deletion_does_not_touch_hyphenated_words() {
            assert_eq!(
                textile("well-known and -gone-"),
                "<p>well-known and <del>gone</del></p>"
            );
        }

        #[test]
        fn markers_need_non_space_content() {
            assert_eq!(textile("a * b * c"), "<p>a * b * c</p>");
        }

        #[test]
        fn trailing_punctuation_closes_phrase() {
            assert_eq!(textile("*done*."), "<p><strong>done</strong>.</p>");
        }

        #[test]
        fn code_span_is_protected() {
            assert_eq!(
                textile("use @a*b*@ here"),
                "<p>use <code>a*b*</code> here</p>"
            );
        }

        #[test]
        fn code_span_is_escaped() {
            assert_eq!(textile("@<b>@"), "<p><code>&lt;b&gt;</code></p>");
        }

        #[test]
        fn link_with_trailing_punctuation() {
            assert_eq!(
                textile("\"Folio\":http://example.com/x_y_z."),
                "<p><a href=\"http://example.com/x_y_z\">Folio</a>.</p>"
            );
        }

        #[test]
        fn link_with_title() {
            assert_eq!(
                textile("\"Docs (read me)\":/docs"),
                "<p><a href=\"/docs\" title=\"read me\">Docs</a></p>"
            );
        }

        #[test]
        fn link_text_gets_phrase_markup() {
            assert_eq!(
                textile("\"*bold* link\":/x"),
                "<p><a href=\"/x\"><strong>bold</strong> link</a></p>"
            );
        }

        #[test]
        fn image_with_alt() {
            assert_eq!(
                textile("!/logo.png(Logo)!"),
                "<p><img src=\"/logo.png\" alt=\"Logo\" /></p>"
            );
        }

        #[test]
        fn glyphs_are_substituted() {
            assert_eq!(
                textile("a -- b... (c)"),
                "<p>a &#8212; b&#8230; &#169;</p>"
            );
        }

        #[test]
        fn glyphs_can_be_disabled() {
            let textile = Textile::new().glyphs(false);
            assert_eq!(textile.parse("a -- b"), "<p>a -- b</p>");
        }

        #[test]
        fn markup_inside_tag_attributes_is_untouched() {
            assert_eq!(
                textile("<a href=\"/x_y_z\">go</a> _now_"),
                "<p><a href=\"/x_y_z\">go</a> <em>now</em></p>"
            );
        }

        #[test]
        fn superscript_and_subscript() {
            assert_eq!(
                textile("x ^2^ and H ~2~"),
                "<p>x <sup>2</sup> and H <sub>2</sub></p>"
            );
        }
    }

    // ==================== Helper Tests ====================

    #[test]
    fn map_text_skips_tags() {
        let out = map_text("a<b>c</b>d", |t| t.to_uppercase());
        assert_eq!(out, "A<b>C</b>D");
    }

    #[test]
    fn map_text_treats_lone_angle_as_text() {
        let out = map_text("1 < 2", |t| t.replace('1', "one"));
        assert_eq!(out, "one < 2");
    }

    #[test]
    fn restore_ignores_unknown_placeholders() {
        let text = format!("{}9{}", PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE);
        assert_eq!(restore(&text, &["x".to_string()]), "9");
    }
}
