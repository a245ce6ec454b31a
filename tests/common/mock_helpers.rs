//! Mock construction helpers

use mockall::mock;
use pipeflow::{Case, Flow, HostObject, Modifier, Node, Notifier, Pipe, Plugin};
use rhai::Engine;
use std::sync::{Arc, Mutex};

mock! {
    pub Modifier {}

    impl Modifier for Modifier {
        fn modify(&self, node: &Node) -> anyhow::Result<()>;
    }
}

mock! {
    pub Notifier {}

    impl Notifier for Notifier {
        fn notify(&self, case: &Case) -> anyhow::Result<()>;
    }
}

/// Plugin recording every hook invocation as `"<hook>:<pipe>"`
#[derive(Clone, Default)]
pub struct RecordingPlugin {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingPlugin {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, hook: &str, pipe: &Pipe) {
        self.calls.lock().unwrap().push(format!("{hook}:{}", pipe.label()));
    }
}

impl Plugin for RecordingPlugin {
    fn init(&self, engine: &mut Engine, _flow: &Flow, pipe: &Pipe) -> anyhow::Result<()> {
        self.record("init", pipe);
        engine.register_fn("greeting", || "hello".to_string());
        Ok(())
    }

    fn call(&self, _flow: &Flow, pipe: &Pipe, this: &HostObject) -> anyhow::Result<()> {
        self.record("call", pipe);
        this.set("stamp", rhai::Dynamic::from(format!("stamp-{}", pipe.label())));
        Ok(())
    }

    fn quit(&self, _flow: &Flow, pipe: &Pipe, _this: &HostObject) -> anyhow::Result<()> {
        self.record("quit", pipe);
        Ok(())
    }
}

/// Plugin whose `call` hook always fails
pub struct FailingPlugin;

impl Plugin for FailingPlugin {
    fn call(&self, _flow: &Flow, _pipe: &Pipe, _this: &HostObject) -> anyhow::Result<()> {
        anyhow::bail!("plugin refused")
    }
}
