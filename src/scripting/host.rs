//! The `this` object bound for every `main` call.

use crate::bridge::FromScript;
use crate::error::{Error, Result};
use crate::flow::Listeners;
use crate::model::{Case, Node, Pipe};
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

struct HostState {
    /// Identity of the step currently running
    pipe: Mutex<(Uuid, String)>,
    /// Values attached by plugins
    values: Mutex<BTreeMap<String, Dynamic>>,
    listeners: Arc<Listeners>,
}

/// Per-call host object. Clones share state.
#[derive(Clone)]
pub struct HostObject(Arc<HostState>);

impl HostObject {
    pub const TYPE_NAME: &'static str = "Host";

    pub fn new(pipe: &Pipe, listeners: Arc<Listeners>) -> Self {
        Self(Arc::new(HostState {
            pipe: Mutex::new((pipe.uuid, pipe.label())),
            values: Mutex::new(BTreeMap::new()),
            listeners,
        }))
    }

    pub fn pipe_uuid(&self) -> Uuid {
        self.0.pipe.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    pub fn pipe_name(&self) -> String {
        self.0.pipe.lock().unwrap_or_else(PoisonError::into_inner).1.clone()
    }

    /// Switches the identity to another step, returning the previous one.
    pub(crate) fn enter(&self, uuid: Uuid, label: &str) -> (Uuid, String) {
        let mut pipe = self.0.pipe.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pipe, (uuid, label.to_string()))
    }

    pub(crate) fn leave(&self, previous: (Uuid, String)) {
        *self.0.pipe.lock().unwrap_or_else(PoisonError::into_inner) = previous;
    }

    /// Value attached under `key`, readable from scripts as `this.<key>`.
    pub fn get(&self, key: &str) -> Option<Dynamic> {
        self.0
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Dynamic) {
        self.0
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Hands `node` to every modifier in registration order.
    pub fn modify(&self, node: &Node) -> Result<()> {
        for modifier in &self.0.listeners.modifiers {
            modifier
                .modify(node)
                .map_err(|e| Error::Listener(format!("{e:#}")))?;
        }
        Ok(())
    }

    /// Hands `case` to every notifier in registration order.
    pub fn notify(&self, case: &Case) -> Result<()> {
        for notifier in &self.0.listeners.notifiers {
            notifier
                .notify(case)
                .map_err(|e| Error::Listener(format!("{e:#}")))?;
        }
        Ok(())
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("pipe", &self.pipe_name())
            .finish_non_exhaustive()
    }
}

type Fallible<T> = std::result::Result<T, Box<EvalAltResult>>;

/// Registers the host object type and its script methods.
pub fn register_host(engine: &mut Engine) {
    engine.register_type_with_name::<HostObject>(HostObject::TYPE_NAME);
    engine.register_get("pipe_name", |h: &mut HostObject| h.pipe_name());
    engine.register_get("pipe_uuid", |h: &mut HostObject| h.pipe_uuid().to_string());
    engine.register_indexer_get(|h: &mut HostObject, key: ImmutableString| {
        h.get(&key).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("modify", |h: &mut HostObject, node: Dynamic| -> Fallible<()> {
        let node = Node::from_script(&node)?;
        Ok(h.modify(&node)?)
    });
    engine.register_fn("notify", |h: &mut HostObject, case: Dynamic| -> Fallible<()> {
        let case = Case::from_script(&case)?;
        Ok(h.notify(&case)?)
    });
}
