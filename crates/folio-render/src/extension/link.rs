//! The link description mini-language.
//!
//! The `a` filter takes one string describing a link:
//!
//! ```text
//! [$]target [== text] [:= description] [.= class list]
//! ```
//!
//! - A leading `$` asks for an element instead of markup.
//! - The delimiters are found left to right, at most one of each. The target
//!   is everything before the first delimiter; each value runs to the next
//!   delimiter.
//! - The target is `/` for the current category's index, `topic` for a topic
//!   in the current category, or `category/topic`. Blank path segments are
//!   skipped, so `/guide//intro/` is `guide/intro`.

use crate::util::non_blank;

const TEXT: &str = "==";
const DESCRIPTION: &str = ":=";
const CLASS: &str = ".=";

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// The current category's index.
    Index,
    /// A topic in the current category.
    Topic(String),
    /// A topic in a named category.
    CategoryTopic { category: String, topic: String },
    /// Nothing usable; the reason is logged.
    Invalid(&'static str),
}

/// A parsed link description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatement {
    pub as_object: bool,
    pub target: LinkTarget,
    pub text: Option<String>,
    pub description: Option<String>,
    pub class: Option<String>,
}

impl LinkStatement {
    pub fn parse(input: &str) -> Self {
        let (as_object, input) = match input.strip_prefix('$') {
            Some(rest) => (true, rest.trim_start_matches([' ', '$'])),
            None => (false, input),
        };

        let mut found: Vec<(usize, &str)> = [TEXT, DESCRIPTION, CLASS]
            .into_iter()
            .filter_map(|delimiter| input.find(delimiter).map(|at| (at, delimiter)))
            .collect();
        found.sort_by_key(|(at, _)| *at);

        // Drop delimiters overlapping an earlier one.
        let mut delimiters: Vec<(usize, &str)> = Vec::with_capacity(found.len());
        for (at, delimiter) in found {
            let clear = delimiters
                .last()
                .map_or(true, |(prev, d)| at >= prev + d.len());
            if clear {
                delimiters.push((at, delimiter));
            }
        }

        let path_end = delimiters.first().map_or(input.len(), |(at, _)| *at);
        let mut parsed = LinkStatement {
            as_object,
            target: LinkTarget::parse(&input[..path_end]),
            text: None,
            description: None,
            class: None,
        };

        for (index, (at, delimiter)) in delimiters.iter().enumerate() {
            let start = at + delimiter.len();
            let end = delimiters.get(index + 1).map_or(input.len(), |(next, _)| *next);
            let value = non_blank(&input[start..end]).map(str::to_string);
            match *delimiter {
                TEXT => parsed.text = value,
                DESCRIPTION => parsed.description = value,
                _ => parsed.class = value,
            }
        }

        parsed
    }
}

impl LinkTarget {
    fn parse(path: &str) -> Self {
        let Some(path) = non_blank(path) else {
            return LinkTarget::Invalid("empty after parsing options");
        };
        if path == "/" {
            return LinkTarget::Index;
        }
        if !path.contains('/') {
            return LinkTarget::Topic(path.to_string());
        }

        let mut segments = path.split('/').filter_map(non_blank);
        match (segments.next(), segments.next()) {
            (Some(category), Some(topic)) => LinkTarget::CategoryTopic {
                category: category.to_string(),
                topic: topic.to_string(),
            },
            (Some(_), None) => LinkTarget::Invalid("no topic found"),
            _ => LinkTarget::Invalid("no category found"),
        }
    }
}

/// The parts of an icon description: `id[/description[/class/...]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconStatement {
    pub id: String,
    pub description: Option<String>,
    pub class: Option<String>,
}

impl IconStatement {
    pub fn parse(input: &str) -> Self {
        if !input.contains('/') {
            return IconStatement {
                id: input.to_string(),
                description: None,
                class: None,
            };
        }

        let trimmed = input.trim_matches([' ', '/']);
        let mut parts = trimmed.split('/').map(str::trim);
        let id = parts.next().unwrap_or_default().to_string();
        let description = parts.next().and_then(non_blank).map(str::to_string);
        let class = parts
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        IconStatement {
            id,
            description,
            class: (!class.is_empty()).then_some(class),
        }
    }
}
