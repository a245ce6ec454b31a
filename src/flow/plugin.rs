//! Extension hooks around interpreter construction and pipe calls.

use super::Flow;
use crate::model::Pipe;
use crate::scripting::HostObject;
use rhai::Engine;

/// Flow extension. Every hook defaults to a no-op.
///
/// - `init` runs once per interpreter, after the console module is installed
///   and before the pipe is compiled, so it can register script functions.
/// - `call` runs before each `main` invocation.
/// - `quit` runs after the batch was written back successfully.
///
/// An error from any hook fails the interpreter construction or the run.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn init(&self, _engine: &mut Engine, _flow: &Flow, _pipe: &Pipe) -> anyhow::Result<()> {
        Ok(())
    }

    fn call(&self, _flow: &Flow, _pipe: &Pipe, _this: &HostObject) -> anyhow::Result<()> {
        Ok(())
    }

    fn quit(&self, _flow: &Flow, _pipe: &Pipe, _this: &HostObject) -> anyhow::Result<()> {
        Ok(())
    }
}
