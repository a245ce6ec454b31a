//! Data model: Nodes, the rules that select them, and the Pipes that
//! transform them.

mod live;
mod meta;
mod node;
mod pipe;
mod then;
pub mod value;
mod when;

pub use live::Live;
pub use meta::{Hook, Meta};
pub use node::Node;
pub use pipe::Pipe;
pub use then::{Case, Then};
pub use value::{Map, Value};
pub use when::When;
