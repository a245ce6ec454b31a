//! Rhai Scripting Layer for Pipes
//!
//! Every pipe carries a Rhai script whose entry point is `fn main`:
//!
//! ```rhai
//! fn main(nodes, next) {
//!     for node in nodes {
//!         if node.kind == "cat" {
//!             node.meta.sound = "meow";
//!             this.modify(node);
//!         }
//!     }
//!     next.call(nodes)
//! }
//! ```
//!
//! `main` may declare zero, one or two parameters. `nodes` is the batch of
//! matched Nodes as a lazy `NodeList` proxy, `next` hands the batch to the
//! following pipe of the chain and `this` is the per-call host object.
//!
//! ## Host API
//!
//! - `this.pipe_name` / `this.pipe_uuid` - identity of the running step
//! - `this.modify(node)` - report a changed Node to the modifier listeners
//! - `this.notify(case)` - publish a `#{ when: .., then: .. }` case
//! - `console::log/info/warn/error/dbg/trace(message, fields, ...)` - structured logging
//! - `none()`, `is_none(v)`, `is_unset(v)` - explicit none vs. deleted values
//! - `parse_time(s)`, `now_utc()` - timestamps
//! - `node.live.since` / `node.live.till` - window bounds (`till` stands in for
//!   the reserved `until`, which stays reachable as `live["until"]`)
//! - `import "flow:<name-or-uuid>" as m;` - functions of a sibling pipe
//!
//! A pipe without code runs [`STUB`], which forwards the batch unchanged.

mod console;
mod engine;
mod host;
mod resolver;

pub use console::register_console;
pub use engine::{configure_engine, register_interrupt, Interrupt};
pub use host::{register_host, HostObject};
pub use resolver::{FlowResolver, FLOW_SCHEME};

use crate::error::{Error, Result};
use crate::model::Pipe;
use rhai::{Engine, Scope, AST};
use uuid::Uuid;

/// Name of the script function invoked for every batch.
pub const ENTRYPOINT: &str = "main";

/// Source compiled for pipes without code.
pub const STUB: &str = "fn main(nodes, next) { next.call(nodes) }";

/// Most parameters `main` may declare: `(nodes, next)`.
pub const MAX_ARITY: usize = 2;

/// A compiled pipe script
#[derive(Debug, Clone)]
pub struct Step {
    pub uuid: Uuid,
    /// Pipe name, or its UUID when unnamed
    pub label: String,
    pub ast: AST,
    /// Parameter count of `main`
    pub arity: usize,
}

impl Step {
    /// Compile `pipe`'s code (or [`STUB`]) with every static import inlined.
    pub fn compile(engine: &Engine, pipe: &Pipe) -> Result<Self> {
        let label = pipe.label();
        let source = pipe.code.get().map(String::as_str).unwrap_or(STUB);
        let ast = engine
            .compile_into_self_contained(&Scope::new(), source)
            .map_err(|e| Error::Compile {
                pipe: label.clone(),
                message: e.to_string(),
            })?;
        let arity = entry_arity(&ast).ok_or_else(|| Error::Compile {
            pipe: label.clone(),
            message: "undefined entrypoint".to_string(),
        })?;
        tracing::debug!(pipe = %label, arity, "compiled pipe script");
        Ok(Self {
            uuid: pipe.uuid,
            label,
            ast,
            arity,
        })
    }
}

/// Parameter count of the script's `main`, if it has a callable one.
pub fn entry_arity(ast: &AST) -> Option<usize> {
    ast.iter_functions()
        .filter(|f| f.name == ENTRYPOINT)
        .map(|f| f.params.len())
        .filter(|n| *n <= MAX_ARITY)
        .min()
}

/// The compiled chain of a pipe: step 0 is the pipe itself, followed by
/// everything reachable through its `next` list.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub steps: Vec<Step>,
}

impl Program {
    pub fn compile<'a>(engine: &Engine, chain: impl IntoIterator<Item = &'a Pipe>) -> Result<Self> {
        let steps = chain
            .into_iter()
            .map(|pipe| Step::compile(engine, pipe))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
