//! Test data builders for creating test objects

use pipeflow::{Hook, Meta, Node, Pipe, Value, When};
use serde_json::json;
use uuid::Uuid;

/// Deterministic UUID for test fixtures
pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Node of the given kind
pub fn node(kind: &str) -> Node {
    Node::new().with_kind(kind)
}

/// Nodes of the given kinds, in order
pub fn nodes(kinds: &[&str]) -> Vec<Node> {
    kinds.iter().map(|k| node(k)).collect()
}

/// Meta built from a JSON object literal
pub fn meta(value: serde_json::Value) -> Meta {
    Meta::from(map(value))
}

/// Hook built from a JSON object literal
pub fn hook(value: serde_json::Value) -> Hook {
    Hook::from(map(value))
}

fn map(value: serde_json::Value) -> pipeflow::Map {
    match Value::from(value) {
        Value::Map(map) => map,
        other => panic!("expected a JSON object, got {other:?}"),
    }
}

/// Builder for creating test Pipes
pub struct PipeBuilder {
    pipe: Pipe,
}

impl PipeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            pipe: Pipe::random().with_name(name),
        }
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.pipe.uuid = uuid;
        self
    }

    pub fn kind(self, kind: &str) -> Self {
        self.when(When::kind([kind]))
    }

    pub fn when(mut self, when: When) -> Self {
        self.pipe = self.pipe.with_when(when);
        self
    }

    pub fn code(mut self, code: &str) -> Self {
        self.pipe = self.pipe.with_code(code);
        self
    }

    pub fn next(mut self, next: impl IntoIterator<Item = Uuid>) -> Self {
        self.pipe = self.pipe.with_next(next);
        self
    }

    pub fn build(self) -> Pipe {
        self.pipe
    }
}

/// Script setting `meta.sound` on every Node of the batch
pub fn sound_script(sound: &str) -> String {
    format!(
        r#"
            fn main(nodes, next) {{
                for node in nodes {{
                    node.meta = #{{ sound: "{sound}" }};
                }}
                next.call(nodes)
            }}
        "#
    )
}

/// JSON form of a Node's meta, `null` when unset
pub fn meta_json(node: &Node) -> serde_json::Value {
    node.meta
        .get()
        .map(|m| Value::Map(m.0.clone()).to_json())
        .unwrap_or_else(|| json!(null))
}
