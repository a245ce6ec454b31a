//! Receivers of the `this.modify(node)` and `this.notify(case)` events.

use crate::model::{Case, Node};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::fmt;
use std::sync::Arc;

/// Receives Nodes a script reports as changed.
pub trait Modifier: Send + Sync {
    fn modify(&self, node: &Node) -> anyhow::Result<()>;
}

/// Receives cases a script publishes.
pub trait Notifier: Send + Sync {
    fn notify(&self, case: &Case) -> anyhow::Result<()>;
}

/// Listeners attached to a flow, called in registration order.
#[derive(Clone, Default)]
pub struct Listeners {
    pub modifiers: Vec<Arc<dyn Modifier>>,
    pub notifiers: Vec<Arc<dyn Notifier>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("modifiers", &self.modifiers.len())
            .field("notifiers", &self.notifiers.len())
            .finish()
    }
}

/// Event forwarded by a [`ChannelListener`]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Modify(Node),
    Notify(Case),
}

/// Forwards every event into a crossbeam channel.
///
/// Sending fails, and with it the script call, once the receiver is gone.
/// A bounded listener blocks the script while the channel is full.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<Event>,
}

impl ChannelListener {
    pub fn unbounded() -> (Self, Receiver<Event>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    pub fn bounded(capacity: usize) -> (Self, Receiver<Event>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }

    fn send(&self, event: Event) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("listener channel disconnected"))
    }
}

impl Modifier for ChannelListener {
    fn modify(&self, node: &Node) -> anyhow::Result<()> {
        self.send(Event::Modify(node.clone()))
    }
}

impl Notifier for ChannelListener {
    fn notify(&self, case: &Case) -> anyhow::Result<()> {
        self.send(Event::Notify(case.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwards_events() {
        let (listener, rx) = ChannelListener::unbounded();
        listener.modify(&Node::new().with_kind("cat")).unwrap();
        listener.notify(&Case::default()).unwrap();
        assert!(matches!(rx.recv().unwrap(), Event::Modify(_)));
        assert_eq!(rx.recv().unwrap(), Event::Notify(Case::default()));
    }

    #[test]
    fn test_disconnected_receiver() {
        let (listener, rx) = ChannelListener::bounded(1);
        drop(rx);
        assert!(listener.modify(&Node::new()).is_err());
    }
}
