//! Fluent builders for extension registrations.
//!
//! Builders are obtained from a [`Registry`] and finalized with `add()`,
//! which hands the registry back so registrations chain:
//!
//! ```rust,ignore
//! registry
//!     .function("at").method(WikiExtension::topic_link).safe(Safety::All).needs_context().add()?
//!     .filter("a").method(WikiExtension::link_filter).safe(Safety::All).needs_context().add()?;
//! ```
//!
//! Flags that only make sense for one kind of callable are only available on
//! that kind's builder.

use std::marker::PhantomData;
use std::sync::Arc;

use minijinja::{Error, Value};

use super::call::{CallOptions, CallScope, Callable, CallableKind, Deprecation, Handler, Safety};
use super::{Extension, Registry};
use crate::error::ConfigError;

/// Marker for the kind of callable a builder produces.
pub trait Kind {
    const KIND: CallableKind;
}

/// Kinds whose results carry a safety marker.
pub trait Escaping: Kind {}

pub enum FunctionKind {}
pub enum FilterKind {}
pub enum TestKind {}

impl Kind for FunctionKind {
    const KIND: CallableKind = CallableKind::Function;
}

impl Kind for FilterKind {
    const KIND: CallableKind = CallableKind::Filter;
}

impl Kind for TestKind {
    const KIND: CallableKind = CallableKind::Test;
}

impl Escaping for FunctionKind {}
impl Escaping for FilterKind {}

pub type FunctionBuilder<'r, E> = CallableBuilder<'r, E, FunctionKind>;
pub type FilterBuilder<'r, E> = CallableBuilder<'r, E, FilterKind>;
pub type TestBuilder<'r, E> = CallableBuilder<'r, E, TestKind>;

/// A method on the extension used as a handler.
pub type Method<E> = fn(&E, &CallScope<'_>, &[Value]) -> Result<Value, Error>;

/// Accumulates one function, filter or test registration.
pub struct CallableBuilder<'r, E: Extension, K: Kind> {
    registry: &'r mut Registry<E>,
    name: String,
    handler: Option<Handler>,
    options: CallOptions,
    kind: PhantomData<K>,
}

impl<'r, E: Extension, K: Kind> CallableBuilder<'r, E, K> {
    pub(super) fn new(registry: &'r mut Registry<E>, name: String) -> Self {
        Self {
            registry,
            name,
            handler: None,
            options: CallOptions::default(),
            kind: PhantomData,
        }
    }

    /// Uses a free-standing closure as the handler.
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CallScope<'_>, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Uses a method of the extension as the handler.
    pub fn method(mut self, method: Method<E>) -> Self {
        let owner = Arc::clone(self.registry.owner());
        self.handler = Some(Arc::new(move |scope: &CallScope<'_>, args: &[Value]| {
            method(&owner, scope, args)
        }));
        self
    }

    /// Packs arguments beyond `max_args` into a trailing list.
    pub fn variadic(mut self) -> Self {
        self.options.variadic = true;
        self
    }

    pub fn max_args(mut self, max: usize) -> Self {
        self.options.max_args = Some(max);
        self
    }

    /// Logs a warning on every call, naming `alternative` when given.
    pub fn deprecated(mut self, alternative: Option<&str>) -> Self {
        self.options.deprecated = Some(Deprecation {
            alternative: alternative.map(str::to_string),
        });
        self
    }

    /// Gives the handler access to the engine state.
    pub fn needs_engine(mut self) -> Self {
        self.options.needs_engine = true;
        self
    }

    /// Gives the handler access to the active render.
    pub fn needs_context(mut self) -> Self {
        self.options.needs_context = true;
        self
    }

    /// Finalizes the registration. A later registration under the same name
    /// replaces this one.
    pub fn add(self) -> Result<&'r mut Registry<E>, ConfigError> {
        let handler = self.handler.ok_or_else(|| ConfigError::MissingHandler {
            kind: K::KIND.label(),
            name: self.name.clone(),
        })?;
        let callable = Callable::new(self.name, K::KIND, handler, self.options);
        self.registry.symbols_mut().insert(callable);
        Ok(self.registry)
    }
}

impl<'r, E: Extension, K: Escaping> CallableBuilder<'r, E, K> {
    /// Declares the output contexts results may be emitted into unescaped.
    pub fn safe(mut self, safety: Safety) -> Self {
        self.options.safety = safety;
        self
    }
}

impl<'r, E: Extension> CallableBuilder<'r, E, FilterKind> {
    /// Escapes unsafe input before the handler sees it.
    pub fn pre_escape(mut self) -> Self {
        self.options.pre_escape = true;
        self
    }

    /// Keeps a safe input's result safe.
    pub fn preserves_safety(mut self) -> Self {
        self.options.preserves_safety = true;
        self
    }
}

impl<'r, E: Extension> CallableBuilder<'r, E, TestKind> {
    /// Requires exactly one argument after the tested value.
    pub fn one_mandatory_argument(mut self) -> Self {
        self.options.one_mandatory_argument = true;
        self
    }
}

/// The handler of an operator: operands in, result out.
pub type OperatorHandler = Arc<dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// A registered operator. Operators without associativity are unary.
#[derive(Clone)]
pub struct Operator {
    pub symbol: String,
    pub precedence: i32,
    pub associativity: Option<Associativity>,
    pub handler: OperatorHandler,
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("symbol", &self.symbol)
            .field("precedence", &self.precedence)
            .field("associativity", &self.associativity)
            .finish_non_exhaustive()
    }
}

impl Operator {
    pub fn is_unary(&self) -> bool {
        self.associativity.is_none()
    }
}

/// Accumulates one operator registration.
pub struct OperatorBuilder<'r, E: Extension> {
    registry: &'r mut Registry<E>,
    symbol: String,
    precedence: i32,
    associativity: Option<Associativity>,
    handler: Option<OperatorHandler>,
}

impl<'r, E: Extension> OperatorBuilder<'r, E> {
    pub(super) fn new(registry: &'r mut Registry<E>, symbol: String) -> Self {
        Self {
            registry,
            symbol,
            precedence: 0,
            associativity: None,
            handler: None,
        }
    }

    pub fn precedence(mut self, precedence: i32) -> Self {
        self.precedence = precedence;
        self
    }

    /// Makes this a left-associative binary operator.
    pub fn left(mut self) -> Self {
        self.associativity = Some(Associativity::Left);
        self
    }

    /// Makes this a right-associative binary operator.
    pub fn right(mut self) -> Self {
        self.associativity = Some(Associativity::Right);
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn add(self) -> Result<&'r mut Registry<E>, ConfigError> {
        let handler = self.handler.ok_or_else(|| ConfigError::MissingHandler {
            kind: "operator",
            name: self.symbol.clone(),
        })?;
        self.registry.symbols_mut().insert_operator(Operator {
            symbol: self.symbol,
            precedence: self.precedence,
            associativity: self.associativity,
            handler,
        });
        Ok(self.registry)
    }
}
