//! # pipeflow: Rule-Driven Node Pipelines
//!
//! A dispatcher that routes batches of data records ("Nodes") through
//! user-supplied Rhai scripts ("Pipes"). Each Pipe declares a predicate
//! (`when`) selecting the Nodes it handles and may chain into further Pipes
//! through `next`.
//!
//! ## Architecture
//!
//! - **Model**: `Node`, `Pipe`, `When`, `Then`, `Case` and the tri-state [`Opt`]
//! - **Deep**: copy / merge / containment / equality over nested values
//! - **Bridge**: lazy copy-on-write proxies exposing host values to scripts
//! - **Scripting**: Rhai engine setup, console logging, `flow:` imports
//! - **Flow**: priority ordering, batch partitioning, pooled interpreters
//!
//! ## Configuration
//!
//! [`FlowConfig`] carries the Rhai safety limits, the logging setup and the
//! directory searched by file imports. It loads from TOML.
//!
//! ## Example
//!
//! ```ignore
//! use pipeflow::{CancelToken, Flow, Node, Pipe, When};
//!
//! let flow = Flow::new([Pipe::random()
//!     .with_name("cats")
//!     .with_when(When::kind(["cat"]))
//!     .with_code(r#"
//!         fn main(nodes, next) {
//!             for node in nodes { node.meta = #{ sound: "meow" }; }
//!             next.call(nodes)
//!         }
//!     "#)]);
//!
//! let mut nodes = vec![Node::new().with_kind("cat")];
//! flow.work(&CancelToken::new(), &mut nodes)?;
//! ```

pub mod bridge;
pub mod config;
pub mod deep;
pub mod error;
pub mod flow;
pub mod model;
pub mod option;
pub mod scripting;

// Re-export commonly used types
pub use config::{init_logging, EngineLimits, FlowConfig, LoggingConfig};
pub use error::{Error, Result, ResultExt};
pub use flow::{
    CancelGuard, CancelToken, ChannelListener, Event, Flow, FlowBuilder, Listeners, Modifier,
    Notifier, Plugin,
};
pub use model::{Case, Hook, Live, Map, Meta, Node, Pipe, Then, Value, When};
pub use option::Opt;
pub use scripting::HostObject;
