//! The record processed by the pipeline.

use super::value::{Map, Value};
use super::{Hook, Live, Meta, Then, When};
use crate::option::Opt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A host record.
///
/// Besides its public tri-state fields a Node carries a private `origin`
/// snapshot: the Node as it looked before the current pipeline stage.
/// Scripts see it as `node.origin` and may diff against it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub uuid: Opt<Uuid>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub kind: Opt<String>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub meta: Opt<Meta>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub hook: Opt<Hook>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub live: Opt<Live>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<Box<Node>>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Opt::Some(uuid);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Opt::Some(kind.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Opt::Some(meta);
        self
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hook = Opt::Some(hook);
        self
    }

    pub fn with_live(mut self, live: Live) -> Self {
        self.live = Opt::Some(live);
        self
    }

    pub fn with_origin(mut self, origin: Node) -> Self {
        self.set_origin(origin);
        self
    }

    /// True when every field is unset and there is no origin.
    pub fn is_zero(&self) -> bool {
        self.origin.is_none()
            && self.uuid.is_unset()
            && self.kind.is_unset()
            && self.meta.is_unset()
            && self.hook.is_unset()
            && self.live.is_unset()
    }

    /// Deep copy, origin included.
    pub fn copy(&self) -> Node {
        self.clone()
    }

    pub fn origin(&self) -> Option<&Node> {
        self.origin.as_deref()
    }

    /// Replaces the origin snapshot; a zero Node clears it.
    pub fn set_origin(&mut self, origin: Node) {
        self.origin = if origin.is_zero() {
            None
        } else {
            Some(Box::new(origin))
        };
    }

    pub fn clear_origin(&mut self) {
        self.origin = None;
    }

    pub fn take_origin(&mut self) -> Option<Node> {
        self.origin.take().map(|o| *o)
    }

    /// Evaluates the match predicate against this Node.
    pub fn when(&self, w: &When) -> bool {
        fn check<F, W>(field: &Opt<F>, pattern: &Opt<W>, accept: impl FnOnce(&F, &W) -> bool) -> bool {
            match pattern {
                Opt::Unset => true,
                Opt::None => !field.is_some(),
                Opt::Some(p) => field.get().is_some_and(|f| accept(f, p)),
            }
        }

        check(&self.uuid, &w.uuid, |id, set| set.contains(id))
            && check(&self.kind, &w.kind, |kind, set| set.contains(kind))
            && check(&self.hook, &w.hook, |hook, patterns| {
                patterns.iter().any(|p| hook.have(p))
            })
            && check(&self.live, &w.live, |live, patterns| {
                patterns.iter().any(|p| live.covers(p))
            })
    }

    /// Applies an effect payload and returns the result.
    pub fn with(mut self, then: Then) -> Node {
        if !then.kind.is_unset() {
            self.kind = then.kind;
        }
        self.meta = match then.meta {
            Opt::Unset => self.meta,
            Opt::None => Opt::None,
            Opt::Some(patch) => Opt::Some(self.meta.get_or_zero().with(patch)),
        };
        self.hook = match then.hook {
            Opt::Unset => self.hook,
            Opt::None => Opt::None,
            Opt::Some(patch) => Opt::Some(self.hook.get_or_zero().with(patch)),
        };
        self.live = match then.live {
            Opt::Unset => self.live,
            Opt::None => Opt::None,
            Opt::Some(patch) => Opt::Some(self.live.get_or_zero().with(patch)),
        };
        self
    }

    /// Generic map rendition, used for logging and for nesting Nodes
    /// inside `Meta`. Unset fields are omitted, explicit none is null.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        put(&mut map, "uuid", &self.uuid, |id| Value::String(id.to_string()));
        put(&mut map, "kind", &self.kind, |k| Value::String(k.clone()));
        put(&mut map, "meta", &self.meta, |m| Value::Map(m.0.clone()));
        put(&mut map, "hook", &self.hook, |h| Value::Map(h.0.clone()));
        put(&mut map, "live", &self.live, live_value);
        if let Some(origin) = &self.origin {
            map.insert("origin".to_string(), origin.to_value());
        }
        Value::Map(map)
    }
}

fn put<T>(map: &mut Map, key: &str, field: &Opt<T>, f: impl FnOnce(&T) -> Value) {
    match field {
        Opt::Unset => {}
        Opt::None => {
            map.insert(key.to_string(), Value::Null);
        }
        Opt::Some(v) => {
            map.insert(key.to_string(), f(v));
        }
    }
}

fn live_value(live: &Live) -> Value {
    let mut map = Map::new();
    put(&mut map, "since", &live.since, |t| Value::Time(*t));
    put(&mut map, "until", &live.until, |t| Value::Time(*t));
    Value::Map(map)
}
