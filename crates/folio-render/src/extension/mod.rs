//! Extension registry.
//!
//! An [`Extension`] adds template-callable behavior to a parser. It registers
//! its functions, filters, tests, tags, visitors and operators once, in
//! [`Extension::setup`], through a [`Registry`]. Once per render it may also
//! adjust the render [`Context`] in [`Extension::setup_context`].
//!
//! Installing an extension ([`InstalledExtension::new`]) runs `setup` exactly
//! once and freezes the resulting [`SymbolTable`]. The parser then hands the
//! table to its template engine.
//!
//! # Example
//!
//! ```rust
//! use folio_render::extension::{Extension, InstalledExtension, Registry, Safety};
//! use folio_render::ConfigError;
//! use minijinja::Value;
//!
//! struct Shout;
//!
//! impl Extension for Shout {
//!     fn name(&self) -> &str {
//!         "shout"
//!     }
//!
//!     fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError> {
//!         registry
//!             .filter("shout")
//!             .handler(|_, args| Ok(Value::from(args[0].to_string().to_uppercase())))
//!             .safe(Safety::All)
//!             .add()?;
//!         Ok(())
//!     }
//! }
//!
//! let installed = InstalledExtension::new(Shout).unwrap();
//! assert!(installed.symbols().filter("shout").is_some());
//! ```

mod builder;
pub mod call;
mod catalog;
mod formatting;
mod link;
mod switch;
mod wiki;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use builder::{
    Associativity, CallableBuilder, Escaping, FilterBuilder, FilterKind, FunctionBuilder,
    FunctionKind, Kind, Method, Operator, OperatorBuilder, OperatorHandler, TestBuilder, TestKind,
};
pub use call::{CallOptions, CallScope, Callable, CallableKind, EngineState, Handler, Safety};
pub use catalog::{ExtensionCatalog, ExtensionDef, ExtensionFactory, ExtensionOptions, DEFAULT_EXTENSIONS};
pub use formatting::FormattingExtension;
pub use link::{IconStatement, LinkStatement, LinkTarget};
pub use switch::{SwitchExtension, SwitchTag};
pub use wiki::{WikiExtension, WikiOptions};

use crate::context::Context;
use crate::error::ConfigError;
use crate::template::{Tag, Visitor};

/// A unit of template-callable behavior.
pub trait Extension: Send + Sync + 'static {
    /// The name the parser files this extension under.
    fn name(&self) -> &str;

    /// Registers everything the extension provides. Called once.
    fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError>
    where
        Self: Sized;

    /// Adjusts a fresh render context. Runs once per render, after globals
    /// and self-references are seeded.
    fn setup_context(&self, _context: &mut Context) {}
}

/// Everything one extension registered.
#[derive(Clone, Default)]
pub struct SymbolTable {
    functions: BTreeMap<String, Arc<Callable>>,
    filters: BTreeMap<String, Arc<Callable>>,
    tests: BTreeMap<String, Arc<Callable>>,
    tags: Vec<Arc<dyn Tag>>,
    visitors: Vec<Arc<dyn Visitor>>,
    unary_operators: BTreeMap<String, Operator>,
    binary_operators: BTreeMap<String, Operator>,
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("tests", &self.tests.keys().collect::<Vec<_>>())
            .field("tags", &self.tags.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("visitors", &self.visitors.len())
            .field("unary_operators", &self.unary_operators.keys().collect::<Vec<_>>())
            .field("binary_operators", &self.binary_operators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SymbolTable {
    fn insert(&mut self, callable: Callable) {
        let table = match callable.kind() {
            CallableKind::Function => &mut self.functions,
            CallableKind::Filter => &mut self.filters,
            CallableKind::Test => &mut self.tests,
        };
        table.insert(callable.name().to_string(), Arc::new(callable));
    }

    fn insert_operator(&mut self, operator: Operator) {
        let table = if operator.is_unary() {
            &mut self.unary_operators
        } else {
            &mut self.binary_operators
        };
        table.insert(operator.symbol.clone(), operator);
    }

    pub fn function(&self, name: &str) -> Option<&Arc<Callable>> {
        self.functions.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<Callable>> {
        self.filters.get(name)
    }

    pub fn test(&self, name: &str) -> Option<&Arc<Callable>> {
        self.tests.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<Callable>> {
        self.functions.values()
    }

    pub fn filters(&self) -> impl Iterator<Item = &Arc<Callable>> {
        self.filters.values()
    }

    pub fn tests(&self) -> impl Iterator<Item = &Arc<Callable>> {
        self.tests.values()
    }

    pub fn tags(&self) -> &[Arc<dyn Tag>] {
        &self.tags
    }

    pub fn visitors(&self) -> &[Arc<dyn Visitor>] {
        &self.visitors
    }

    pub fn unary_operators(&self) -> impl Iterator<Item = &Operator> {
        self.unary_operators.values()
    }

    pub fn binary_operators(&self) -> impl Iterator<Item = &Operator> {
        self.binary_operators.values()
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.functions.len()
            + self.filters.len()
            + self.tests.len()
            + self.tags.len()
            + self.visitors.len()
            + self.unary_operators.len()
            + self.binary_operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The registration surface handed to [`Extension::setup`].
pub struct Registry<E: Extension> {
    owner: Arc<E>,
    symbols: SymbolTable,
}

impl<E: Extension> Registry<E> {
    fn new(owner: Arc<E>) -> Self {
        Self {
            owner,
            symbols: SymbolTable::default(),
        }
    }

    /// The extension being set up.
    pub fn owner(&self) -> &Arc<E> {
        &self.owner
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn function(&mut self, name: impl Into<String>) -> FunctionBuilder<'_, E> {
        CallableBuilder::new(self, name.into())
    }

    pub fn filter(&mut self, name: impl Into<String>) -> FilterBuilder<'_, E> {
        CallableBuilder::new(self, name.into())
    }

    pub fn test(&mut self, name: impl Into<String>) -> TestBuilder<'_, E> {
        CallableBuilder::new(self, name.into())
    }

    pub fn operator(&mut self, symbol: impl Into<String>) -> OperatorBuilder<'_, E> {
        OperatorBuilder::new(self, symbol.into())
    }

    pub fn tag(&mut self, tag: impl Tag + 'static) -> &mut Self {
        self.symbols.tags.push(Arc::new(tag));
        self
    }

    pub fn visitor(&mut self, visitor: impl Visitor + 'static) -> &mut Self {
        self.symbols.visitors.push(Arc::new(visitor));
        self
    }
}

/// An extension after `setup` ran.
#[derive(Clone)]
pub struct InstalledExtension {
    name: String,
    extension: Arc<dyn Extension>,
    any: Arc<dyn Any + Send + Sync>,
    symbols: Arc<SymbolTable>,
}

impl fmt::Debug for InstalledExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledExtension")
            .field("name", &self.name)
            .field("symbols", &self.symbols)
            .finish()
    }
}

impl InstalledExtension {
    /// Runs `setup` and captures the registrations.
    pub fn new<E: Extension>(extension: E) -> Result<Self, ConfigError> {
        let owner = Arc::new(extension);
        let mut registry = Registry::new(Arc::clone(&owner));
        owner.setup(&mut registry)?;

        let symbols = registry.symbols;
        log::debug!(
            "installed extension '{}': {} functions, {} filters, {} tests, {} tags, {} visitors",
            owner.name(),
            symbols.functions.len(),
            symbols.filters.len(),
            symbols.tests.len(),
            symbols.tags.len(),
            symbols.visitors.len()
        );

        Ok(Self {
            name: owner.name().to_string(),
            extension: Arc::clone(&owner) as Arc<dyn Extension>,
            any: owner as Arc<dyn Any + Send + Sync>,
            symbols: Arc::new(symbols),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn setup_context(&self, context: &mut Context) {
        self.extension.setup_context(context);
    }

    /// The concrete extension, if it is an `E`.
    pub fn downcast<E: Extension>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.any).downcast::<E>().ok()
    }
}
