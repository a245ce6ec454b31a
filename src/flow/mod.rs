//! The pipe dispatcher.
//!
//! A [`Flow`] owns an ordered stock of pipes. [`Flow::work`] splits a batch
//! of Nodes into contiguous runs that match the same pipe and hands each run
//! to that pipe's script:
//!
//! ```text
//! nodes:  [cat, cat, dog, bird, cat]
//! runs:   [cat, cat] → cats   [dog] → dogs   (bird unmatched)   [cat] → cats
//! ```
//!
//! ## Ordering
//!
//! Pipes are tried in priority order, the first match wins:
//! 1. pipes whose `when` constrains `uuid`
//! 2. then `kind`, then `hook`
//! 3. catch-all pipes (`when` present but empty)
//! 4. pipes without `when`, which never match directly
//!
//! Each appearance in another pipe's `next` lowers a pipe's rank by one,
//! and ties keep registration order.
//!
//! ## Interpreters
//!
//! Every pipe compiles once into a [`Program`] covering its `next` chain.
//! Interpreters are pooled per pipe and built on demand, so concurrent
//! `work` calls on the same flow never share a Rhai scope.

mod cancel;
mod dispatch;
mod listener;
mod plugin;
mod pool;
mod registry;

pub use cancel::{CancelGuard, CancelToken};
pub use listener::{ChannelListener, Event, Listeners, Modifier, Notifier};
pub use plugin::Plugin;
pub(crate) use registry::Registry;

use crate::config::FlowConfig;
use crate::error::{Error, Result};
use crate::model::Pipe;
use crate::scripting::{configure_engine, register_console, FlowResolver, Program};
use pool::{Interpreter, Pool};
use rhai::Engine;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Builder for a [`Flow`]
#[derive(Default)]
pub struct FlowBuilder {
    pipes: Vec<Pipe>,
    plugins: Vec<Arc<dyn Plugin>>,
    listeners: Listeners,
    config: FlowConfig,
}

impl FlowBuilder {
    pub fn pipe(mut self, pipe: Pipe) -> Self {
        self.pipes.push(pipe);
        self
    }

    pub fn pipes(mut self, pipes: impl IntoIterator<Item = Pipe>) -> Self {
        self.pipes.extend(pipes);
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn modifier(mut self, modifier: impl Modifier + 'static) -> Self {
        self.listeners.modifiers.push(Arc::new(modifier));
        self
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.listeners.notifiers.push(Arc::new(notifier));
        self
    }

    /// Registers one value as both modifier and notifier.
    pub fn listener<L: Modifier + Notifier + 'static>(mut self, listener: L) -> Self {
        let listener = Arc::new(listener);
        self.listeners.modifiers.push(listener.clone());
        self.listeners.notifiers.push(listener);
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Flow {
        let registry = Registry::new(self.pipes);
        let pools = (0..registry.len()).map(|_| Pool::default()).collect();
        tracing::debug!(pipes = registry.len(), "flow built");
        Flow {
            registry: Arc::new(registry),
            plugins: self.plugins,
            listeners: Arc::new(self.listeners),
            config: self.config,
            programs: RwLock::new(HashMap::new()),
            pools,
        }
    }
}

/// Rule-driven dispatcher over a set of pipes
pub struct Flow {
    registry: Arc<Registry>,
    plugins: Vec<Arc<dyn Plugin>>,
    listeners: Arc<Listeners>,
    config: FlowConfig,
    /// Compiled chains keyed by their head pipe
    programs: RwLock<HashMap<Uuid, Arc<Program>>>,
    /// Idle interpreters, parallel to the registry's dispatch order
    pools: Vec<Pool>,
}

impl Flow {
    pub fn builder() -> FlowBuilder {
        FlowBuilder::default()
    }

    /// Flow over `pipes` with default configuration and no extensions.
    pub fn new(pipes: impl IntoIterator<Item = Pipe>) -> Self {
        Self::builder().pipes(pipes).build()
    }

    /// Pipes in dispatch order, duplicates removed.
    pub fn pipes(&self) -> &[Pipe] {
        self.registry.pipes()
    }

    /// Registered pipe with the given UUID string or name.
    pub fn import(&self, key: &str) -> Option<&Pipe> {
        self.registry.lookup(key)
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Number of idle interpreters pooled for `key`.
    pub fn idle_interpreters(&self, key: &str) -> usize {
        self.registry
            .position(key)
            .map(|i| self.pools[i].len())
            .unwrap_or_default()
    }

    /// Compiled chain of the pipe at `index`, compiling it on first use.
    fn program(&self, index: usize, engine: &Engine) -> Result<Arc<Program>> {
        let pipe = &self.registry.pipes()[index];
        if let Some(program) = self
            .programs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pipe.uuid)
        {
            return Ok(Arc::clone(program));
        }

        let mut programs = self.programs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(program) = programs.get(&pipe.uuid) {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(Program::compile(engine, self.registry.chain(index))?);
        programs.insert(pipe.uuid, Arc::clone(&program));
        tracing::debug!(pipe = %pipe.label(), steps = program.len(), "compiled program");
        Ok(program)
    }

    /// Builds a fresh interpreter for the pipe at `index`.
    fn spawn(&self, index: usize) -> Result<Interpreter> {
        let pipe = &self.registry.pipes()[index];
        let label = pipe.label();

        let mut engine = Engine::new();
        configure_engine(&mut engine, &self.config.engine);
        engine.set_module_resolver(FlowResolver::new(
            Arc::clone(&self.registry),
            self.config.script_dir.clone(),
        ));
        register_console(&mut engine, &label);

        for plugin in &self.plugins {
            plugin
                .init(&mut engine, self, pipe)
                .map_err(|e| Error::Plugin(format!("{} init: {e:#}", plugin.name())))?;
        }

        let program = self.program(index, &engine)?;
        Interpreter::assemble(engine, program, label)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("pipes", &self.registry.len())
            .field("plugins", &self.plugins.len())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
