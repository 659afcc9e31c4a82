//! Template-callable registrations and their invocation rules.
//!
//! A [`Callable`] is a function, filter or test registered by an extension.
//! Its flags are applied on every call, independent of the engine:
//!
//! - arity: `max_args` caps the argument count; a variadic callable packs the
//!   excess into one trailing list instead of failing;
//! - deprecation: every call logs a warning naming the replacement;
//! - pre-escaping (filters): an unsafe input is HTML-escaped first;
//! - safety: results of callables safe for HTML are marked safe, and filters
//!   that preserve safety keep a safe input safe;
//! - injection: the [`CallScope`] carries the engine state and render scope
//!   only when the callable asked for them.

use std::fmt;
use std::sync::Arc;

use minijinja::{Error, ErrorKind, State, Value};

use crate::context::RenderScope;

/// The handler behind a callable. Filters and tests receive their input as
/// the first argument.
pub type Handler = Arc<dyn Fn(&CallScope<'_>, &[Value]) -> Result<Value, Error> + Send + Sync>;

/// What kind of template callable this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
    Function,
    Filter,
    Test,
}

impl CallableKind {
    pub fn label(self) -> &'static str {
        match self {
            CallableKind::Function => "function",
            CallableKind::Filter => "filter",
            CallableKind::Test => "test",
        }
    }
}

/// Which output contexts a result may be emitted into unescaped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Safety {
    #[default]
    None,
    All,
    Contexts(Vec<String>),
}

impl Safety {
    /// Whether results may be emitted into HTML unescaped.
    pub fn is_html_safe(&self) -> bool {
        match self {
            Safety::None => false,
            Safety::All => true,
            Safety::Contexts(contexts) => contexts.iter().any(|c| c == "html" || c == "all"),
        }
    }
}

/// A deprecation notice with an optional replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecation {
    pub alternative: Option<String>,
}

/// Registration flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub variadic: bool,
    pub max_args: Option<usize>,
    pub deprecated: Option<Deprecation>,
    pub safety: Safety,
    pub needs_engine: bool,
    pub needs_context: bool,
    /// Filters only.
    pub pre_escape: bool,
    /// Filters only.
    pub preserves_safety: bool,
    /// Tests only.
    pub one_mandatory_argument: bool,
}

/// Engine state visible to callables that set `needs_engine`.
pub trait EngineState {
    /// Looks up a variable in the active template context.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// The name of the template being rendered.
    fn template_name(&self) -> &str;
}

impl EngineState for State<'_, '_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        State::lookup(self, name)
    }

    fn template_name(&self) -> &str {
        self.name()
    }
}

/// What a handler can see of the call site.
pub struct CallScope<'a> {
    name: &'a str,
    engine: Option<&'a dyn EngineState>,
    render: Option<&'a RenderScope>,
}

impl<'a> CallScope<'a> {
    pub fn new(
        name: &'a str,
        engine: Option<&'a dyn EngineState>,
        render: Option<&'a RenderScope>,
    ) -> Self {
        Self {
            name,
            engine,
            render,
        }
    }

    /// The registered name of the callable.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn engine(&self) -> Option<&'a dyn EngineState> {
        self.engine
    }

    /// The active render, if the callable asked for it and one is running.
    pub fn render(&self) -> Option<&'a RenderScope> {
        self.render
    }

    pub fn require_render(&self) -> Result<&'a RenderScope, Error> {
        self.render.ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("'{}' can only be called while rendering a topic", self.name),
            )
        })
    }
}

/// A registered function, filter or test.
#[derive(Clone)]
pub struct Callable {
    name: String,
    kind: CallableKind,
    handler: Handler,
    options: CallOptions,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Callable {
    pub fn new(name: impl Into<String>, kind: CallableKind, handler: Handler, options: CallOptions) -> Self {
        Self {
            name: name.into(),
            kind,
            handler,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// Calls the handler, applying the registration flags.
    pub fn invoke(
        &self,
        engine: Option<&dyn EngineState>,
        render: Option<&RenderScope>,
        args: &[Value],
    ) -> Result<Value, Error> {
        if let Some(deprecation) = &self.options.deprecated {
            match &deprecation.alternative {
                Some(alternative) => log::warn!(
                    "{} '{}' is deprecated; use '{}' instead",
                    self.kind.label(),
                    self.name,
                    alternative
                ),
                None => log::warn!("{} '{}' is deprecated", self.kind.label(), self.name),
            }
        }

        let mut args = self.pack(args)?;

        if self.kind == CallableKind::Test
            && self.options.one_mandatory_argument
            && args.len() != 2
        {
            return Err(Error::new(
                ErrorKind::MissingArgument,
                format!("test '{}' takes exactly one argument", self.name),
            ));
        }

        if self.kind == CallableKind::Filter && self.options.pre_escape {
            if let Some(first) = args.first_mut() {
                if !first.is_safe() {
                    let escaped = html_escape::encode_text(&first.to_string()).into_owned();
                    *first = Value::from_safe_string(escaped);
                }
            }
        }

        let input_safe = args.first().is_some_and(Value::is_safe);
        let scope = CallScope::new(
            &self.name,
            if self.options.needs_engine { engine } else { None },
            if self.options.needs_context { render } else { None },
        );

        let result = (self.handler)(&scope, &args)?;

        let safe = self.options.safety.is_html_safe()
            || (self.kind == CallableKind::Filter && self.options.preserves_safety && input_safe);
        Ok(if safe { mark_safe(result) } else { result })
    }

    fn pack(&self, args: &[Value]) -> Result<Vec<Value>, Error> {
        let Some(max) = self.options.max_args else {
            return Ok(args.to_vec());
        };
        if args.len() <= max {
            return Ok(args.to_vec());
        }
        if self.options.variadic {
            let mut packed = args[..max].to_vec();
            packed.push(Value::from(args[max..].to_vec()));
            Ok(packed)
        } else {
            Err(Error::new(
                ErrorKind::TooManyArguments,
                format!(
                    "{} '{}' takes at most {} arguments",
                    self.kind.label(),
                    self.name,
                    max
                ),
            ))
        }
    }
}

fn mark_safe(value: Value) -> Value {
    if value.is_safe() {
        return value;
    }
    match value.as_str() {
        Some(text) => Value::from_safe_string(text.to_string()),
        None => value,
    }
}

/// An argument, treating `none` and undefined as absent.
pub fn arg(args: &[Value], index: usize) -> Option<&Value> {
    args.get(index).filter(|v| !v.is_undefined() && !v.is_none())
}

/// An argument as a string.
pub fn arg_string(args: &[Value], index: usize) -> Option<String> {
    arg(args, index).map(|v| match v.as_str() {
        Some(text) => text.to_string(),
        None => v.to_string(),
    })
}

/// An argument as a flag; absent is `false`.
pub fn arg_bool(args: &[Value], index: usize) -> bool {
    arg(args, index).is_some_and(Value::is_true)
}

/// A required string argument.
pub fn required_string(args: &[Value], index: usize, what: &str) -> Result<String, Error> {
    arg_string(args, index).ok_or_else(|| {
        Error::new(
            ErrorKind::MissingArgument,
            format!("missing required argument '{}'", what),
        )
    })
}
