//! Template engine abstraction.
//!
//! This module defines the [`TemplateEngine`] trait, the seam between the
//! parser and a template backend. The default implementation is
//! [`MiniJinjaEngine`].

use std::sync::{Arc, RwLock};

use minijinja::value::Rest;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, State, Value};

use super::SourceTransforms;
use crate::context::{RenderScope, Variables, SCOPE_VAR};
use crate::error::{ConfigError, WikiError};
use crate::extension::{Callable, EngineState, InstalledExtension};
use crate::loader::Loader;
use crate::util::{read, write};

/// A template backend.
///
/// Engines resolve every template name through the attached [`Loader`],
/// install extension registrations, and render a named document with a set
/// of variables.
pub trait TemplateEngine: Send + Sync {
    /// Routes template lookups (including `include` and `extends`) through
    /// `loader`.
    fn attach_loader(&mut self, loader: Arc<Loader>);

    /// Installs everything an extension registered.
    ///
    /// Fails with [`ConfigError::Unsupported`] for registrations the engine
    /// cannot express.
    fn install(&mut self, extension: &InstalledExtension) -> Result<(), ConfigError>;

    /// Renders the document registered under `name`.
    fn render(&self, name: &str, variables: Variables, scope: &RenderScope) -> Result<String, WikiError>;

    /// Whether custom block tags can be installed.
    fn supports_tags(&self) -> bool;

    /// Whether source visitors can be installed.
    fn supports_visitors(&self) -> bool;

    /// Whether custom operators can be installed.
    fn supports_operators(&self) -> bool;
}

/// MiniJinja-based template engine.
///
/// - Functions, filters and tests are installed on the environment and apply
///   their registration flags on every call.
/// - Tags and visitors become source transforms, run on every template
///   source before it is compiled.
/// - Operators are not supported.
pub struct MiniJinjaEngine {
    env: Environment<'static>,
    loader: Option<Arc<Loader>>,
    transforms: Arc<RwLock<SourceTransforms>>,
}

impl MiniJinjaEngine {
    /// Creates an engine that does not escape output.
    pub fn new() -> Self {
        Self::with_autoescape(false)
    }

    /// Creates an engine, HTML-escaping output when `autoescape` is set.
    pub fn with_autoescape(autoescape: bool) -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(move |_name| {
            if autoescape {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });
        Self {
            env,
            loader: None,
            transforms: Arc::new(RwLock::new(SourceTransforms::new())),
        }
    }

    /// Returns a reference to the underlying MiniJinja environment.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Returns a mutable reference to the underlying MiniJinja environment.
    ///
    /// Anything registered here directly bypasses the extension flags.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    fn install_function(&mut self, callable: Arc<Callable>) {
        let name = callable.name().to_string();
        self.env
            .add_function(name, move |state: &State, args: Rest<Value>| -> Result<Value, Error> {
                let scope = RenderScope::from_state(state);
                let engine: &dyn EngineState = state;
                callable.invoke(Some(engine), scope.as_deref(), &args)
            });
    }

    fn install_filter(&mut self, callable: Arc<Callable>) {
        let name = callable.name().to_string();
        self.env.add_filter(
            name,
            move |state: &State, value: Value, args: Rest<Value>| -> Result<Value, Error> {
                let scope = RenderScope::from_state(state);
                let engine: &dyn EngineState = state;
                callable.invoke(Some(engine), scope.as_deref(), &prepend(value, args))
            },
        );
    }

    fn install_test(&mut self, callable: Arc<Callable>) {
        let name = callable.name().to_string();
        self.env.add_test(
            name,
            move |state: &State, value: Value, args: Rest<Value>| -> Result<bool, Error> {
                let scope = RenderScope::from_state(state);
                let engine: &dyn EngineState = state;
                callable
                    .invoke(Some(engine), scope.as_deref(), &prepend(value, args))
                    .map(|result| result.is_true())
            },
        );
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn prepend(value: Value, rest: Rest<Value>) -> Vec<Value> {
    let mut args = Vec::with_capacity(rest.0.len() + 1);
    args.push(value);
    args.extend(rest.0);
    args
}

impl TemplateEngine for MiniJinjaEngine {
    fn attach_loader(&mut self, loader: Arc<Loader>) {
        let transforms = Arc::clone(&self.transforms);
        let source_loader = Arc::clone(&loader);
        // Not `TemplateNotFound`: includes swallow the cause of that kind.
        self.env.set_loader(move |name| {
            let source = source_loader.resolve_source(name).map_err(|err| {
                Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
            })?;
            let source = read(&transforms).apply(name, &source).map_err(|err| {
                Error::new(ErrorKind::SyntaxError, err.to_string()).with_source(err)
            })?;
            Ok(Some(source))
        });
        self.loader = Some(loader);
    }

    fn install(&mut self, extension: &InstalledExtension) -> Result<(), ConfigError> {
        let symbols = extension.symbols();
        if let Some(operator) = symbols
            .unary_operators()
            .chain(symbols.binary_operators())
            .next()
        {
            return Err(ConfigError::Unsupported {
                feature: "operators",
                name: operator.symbol.clone(),
            });
        }

        for callable in symbols.functions() {
            self.install_function(Arc::clone(callable));
        }
        for callable in symbols.filters() {
            self.install_filter(Arc::clone(callable));
        }
        for callable in symbols.tests() {
            self.install_test(Arc::clone(callable));
        }

        let mut transforms = write(&self.transforms);
        for tag in symbols.tags() {
            transforms.add_tag(Arc::clone(tag));
        }
        for visitor in symbols.visitors() {
            transforms.add_visitor(Arc::clone(visitor));
        }
        Ok(())
    }

    fn render(&self, name: &str, mut variables: Variables, scope: &RenderScope) -> Result<String, WikiError> {
        let loader = self.loader.as_ref().ok_or(ConfigError::NoLoader)?;
        let source = loader.resolve_source(name)?;
        let source = read(&self.transforms).apply(name, &source)?;
        variables.insert(SCOPE_VAR.to_string(), scope.to_value());
        Ok(self.env.render_named_str(name, &source, &variables)?)
    }

    fn supports_tags(&self) -> bool {
        true
    }

    fn supports_visitors(&self) -> bool {
        true
    }

    fn supports_operators(&self) -> bool {
        false
    }
}
