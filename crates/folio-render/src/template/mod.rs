//! Template engine integration.
//!
//! - [`TemplateEngine`]: the seam between the parser and a template backend.
//! - [`MiniJinjaEngine`]: the default backend.
//! - [`Tag`], [`Visitor`] and [`SourceTransforms`]: custom syntax, applied as
//!   source rewrites before compilation.

mod engine;
mod tags;

pub use engine::{MiniJinjaEngine, TemplateEngine};
pub use tags::{
    expand_tag, statements, SourceTransforms, Statement, Tag, TagBlock, TagError, Visitor,
    MAX_NESTING,
};
