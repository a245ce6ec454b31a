use super::{
    acquire, as_string, descend, opt_from_dynamic, opt_to_dynamic, unexpected, DynamicObject,
    FromScript, IntoScript, Null,
};
use crate::error::{Error, Result};
use crate::model::{Hook, Live, Meta, Node};
use rhai::Dynamic;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Uuid,
    Kind,
    Meta,
    Hook,
    Live,
    Origin,
}

impl Field {
    const ALL: [Field; 6] = [
        Field::Uuid,
        Field::Kind,
        Field::Meta,
        Field::Hook,
        Field::Live,
        Field::Origin,
    ];

    fn parse(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == key)
    }

    fn name(self) -> &'static str {
        match self {
            Field::Uuid => "uuid",
            Field::Kind => "kind",
            Field::Meta => "meta",
            Field::Hook => "hook",
            Field::Live => "live",
            Field::Origin => "origin",
        }
    }

    fn is_set(self, node: &Node) -> bool {
        match self {
            Field::Uuid => !node.uuid.is_unset(),
            Field::Kind => !node.kind.is_unset(),
            Field::Meta => !node.meta.is_unset(),
            Field::Hook => !node.hook.is_unset(),
            Field::Live => !node.live.is_unset(),
            Field::Origin => node.origin().is_some(),
        }
    }

    /// Script value of the field on `node`; `()` when unset.
    fn read(self, node: &Node) -> Dynamic {
        match self {
            Field::Uuid => opt_to_dynamic(&node.uuid, |id| Dynamic::from(id.to_string())),
            Field::Kind => opt_to_dynamic(&node.kind, |k| Dynamic::from(k.clone())),
            Field::Meta => opt_to_dynamic(&node.meta, |m| m.into_script()),
            Field::Hook => opt_to_dynamic(&node.hook, |h| h.into_script()),
            Field::Live => opt_to_dynamic(&node.live, |l| l.into_script()),
            Field::Origin => node
                .origin()
                .map(|o| o.into_script())
                .unwrap_or(Dynamic::UNIT),
        }
    }

    /// Writes a script value into the field: `()` unsets it, `none()`
    /// makes it explicitly absent.
    fn write(self, node: &mut Node, value: &Dynamic, depth: usize) -> Result<()> {
        match self {
            Field::Uuid => node.uuid = opt_from_dynamic(value, parse_uuid)?,
            Field::Kind => node.kind = opt_from_dynamic(value, |v| as_string(v, "Kind"))?,
            Field::Meta => {
                node.meta = opt_from_dynamic(value, |v| Meta::from_script_at(v, depth))?
            }
            Field::Hook => {
                node.hook = opt_from_dynamic(value, |v| Hook::from_script_at(v, depth))?
            }
            Field::Live => {
                node.live = opt_from_dynamic(value, |v| Live::from_script_at(v, depth))?
            }
            Field::Origin => {
                if value.is_unit() || value.is::<Null>() {
                    node.clear_origin();
                } else {
                    node.set_origin(Node::from_script_at(value, depth)?);
                }
            }
        }
        Ok(())
    }
}

fn parse_uuid(value: &Dynamic) -> Result<Uuid> {
    let s = as_string(value, "Uuid")?;
    Uuid::parse_str(&s).map_err(|_| Error::unexpected(format!("string {s:?}"), "Uuid"))
}

fn unknown_key(key: &str) -> Error {
    Error::unexpected(format!("key {key:?}"), NodeHandle::TYPE_NAME)
}

#[derive(Debug, Default)]
struct LazyNode {
    proto: Node,
    overlay: [Option<Dynamic>; 6],
}

/// Lazy proxy over a [`Node`]. Its keys are the Node's fields plus
/// `origin`, backed by the Node's pre-stage snapshot.
#[derive(Debug, Clone, Default)]
pub struct NodeHandle(Arc<Mutex<LazyNode>>);

impl NodeHandle {
    pub const TYPE_NAME: &'static str = "Node";

    pub fn new(proto: Node) -> Self {
        Self(Arc::new(Mutex::new(LazyNode {
            proto,
            overlay: Default::default(),
        })))
    }

    pub fn write_back(&self, depth: usize) -> Result<Node> {
        let depth = descend(depth)?;
        let state = acquire(&self.0, Self::TYPE_NAME)?;
        let mut node = state.proto.clone();
        for (field, slot) in Field::ALL.into_iter().zip(&state.overlay) {
            if let Some(value) = slot {
                field
                    .write(&mut node, value, depth)
                    .map_err(|e| e.with_context(field.name()))?;
            }
        }
        Ok(node)
    }
}

impl DynamicObject for NodeHandle {
    fn get(&self, key: &str) -> Result<Dynamic> {
        let Some(field) = Field::parse(key) else {
            return Ok(Dynamic::UNIT);
        };
        let mut state = acquire(&self.0, Self::TYPE_NAME)?;
        if let Some(value) = &state.overlay[field as usize] {
            return Ok(value.clone());
        }
        if !field.is_set(&state.proto) {
            return Ok(Dynamic::UNIT);
        }
        let value = field.read(&state.proto);
        state.overlay[field as usize] = Some(value.clone());
        Ok(value)
    }

    fn set(&self, key: &str, value: Dynamic) -> Result<()> {
        let field = Field::parse(key).ok_or_else(|| unknown_key(key))?;
        let mut state = acquire(&self.0, Self::TYPE_NAME)?;
        state.overlay[field as usize] = Some(value);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.keys().iter().any(|k| k == key)
    }

    fn delete(&self, key: &str) -> Result<Dynamic> {
        let previous = self.get(key)?;
        self.set(key, Dynamic::UNIT)?;
        Ok(previous)
    }

    fn keys(&self) -> Vec<String> {
        let Ok(state) = acquire(&self.0, Self::TYPE_NAME) else {
            return Vec::new();
        };
        Field::ALL
            .into_iter()
            .filter(|field| match &state.overlay[*field as usize] {
                Some(value) => !value.is_unit(),
                None => field.is_set(&state.proto),
            })
            .map(|field| field.name().to_string())
            .collect()
    }
}

impl IntoScript for Node {
    fn into_script(&self) -> Dynamic {
        Dynamic::from(NodeHandle::new(self.clone()))
    }
}

impl FromScript for Node {
    const TYPE_NAME: &'static str = NodeHandle::TYPE_NAME;

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Node> {
        if let Some(handle) = value.read_lock::<NodeHandle>() {
            return handle.write_back(depth);
        }
        if let Some(map) = value.read_lock::<rhai::Map>() {
            let depth = descend(depth)?;
            let mut node = Node::default();
            for (key, v) in map.iter() {
                let field = Field::parse(key).ok_or_else(|| unknown_key(key))?;
                field
                    .write(&mut node, v, depth)
                    .map_err(|e| e.with_context(field.name()))?;
            }
            return Ok(node);
        }
        Err(unexpected(value, Self::TYPE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{LiveHandle, ObjectHandle};
    use crate::model::Value;
    use crate::option::Opt;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> Node {
        let mut node = Node::new()
            .with_uuid(Uuid::from_u128(42))
            .with_kind("cat")
            .with_meta(
                Meta::new()
                    .set("n", 1i64)
                    .set("when", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            )
            .with_live(Live::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ))
            .with_origin(Node::new().with_kind("kitten"));
        node.hook = Opt::None;
        node
    }

    #[test]
    fn test_untouched_round_trip_keeps_origin() {
        let node = sample();
        let back = Node::from_script(&node.into_script()).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_read_everything_round_trip() {
        let node = sample();
        let handle = NodeHandle::new(node.clone());
        for key in handle.keys() {
            handle.get(&key).unwrap();
        }
        let live = handle.get("live").unwrap();
        live.read_lock::<LiveHandle>().unwrap().get("since").unwrap();
        assert_eq!(handle.write_back(0).unwrap(), node);
    }

    #[test]
    fn test_tri_state_fields() {
        let handle = NodeHandle::new(sample());
        assert_eq!(handle.keys(), vec!["uuid", "kind", "meta", "hook", "live", "origin"]);
        assert!(handle.get("hook").unwrap().is::<Null>());
        assert_eq!(
            handle.get("uuid").unwrap().into_string().unwrap(),
            Uuid::from_u128(42).to_string()
        );

        handle.set("uuid", Null::dynamic()).unwrap();
        handle.set("kind", Dynamic::UNIT).unwrap();
        handle.set("origin", Dynamic::UNIT).unwrap();
        assert_eq!(handle.keys(), vec!["uuid", "meta", "hook", "live"]);

        let node = handle.write_back(0).unwrap();
        assert!(node.uuid.is_none());
        assert!(node.kind.is_unset());
        assert!(node.origin().is_none());
    }

    #[test]
    fn test_unset_field_is_not_cached() {
        let handle = NodeHandle::new(Node::new());
        assert!(handle.get("meta").unwrap().is_unit());
        assert!(handle.keys().is_empty());
        assert!(handle.write_back(0).unwrap().is_zero());
    }

    #[test]
    fn test_hook_written_through_nested_proxy() {
        let handle = NodeHandle::new(Node::new().with_hook(Hook::new()));
        let hook = handle.get("hook").unwrap();
        hook.read_lock::<ObjectHandle>()
            .unwrap()
            .set("kind", Dynamic::from("cat".to_string()))
            .unwrap();
        let node = handle.write_back(0).unwrap();
        let expected = Value::from(json!({"kind": "cat"}));
        assert_eq!(Some(&node.hook.get().unwrap().0), expected.as_map());
    }

    #[test]
    fn test_uuid_parse_error() {
        let handle = NodeHandle::new(Node::new());
        handle.set("uuid", Dynamic::from("not-a-uuid".to_string())).unwrap();
        let err = handle.write_back(0).unwrap_err();
        assert!(err.to_string().starts_with("uuid:"));
    }

    #[test]
    fn test_unknown_key() {
        let handle = NodeHandle::new(Node::new());
        assert!(handle.get("nope").unwrap().is_unit());
        assert!(handle.set("nope", Dynamic::from_int(1)).is_err());
    }

    #[test]
    fn test_from_rhai_map() {
        let mut map = rhai::Map::new();
        map.insert("kind".into(), Dynamic::from("dog".to_string()));
        map.insert("meta".into(), Null::dynamic());
        map.insert("live".into(), Dynamic::UNIT);
        let node = Node::from_script(&Dynamic::from_map(map)).unwrap();
        assert_eq!(node.kind, Opt::Some("dog".to_string()));
        assert!(node.meta.is_none());
        assert!(node.live.is_unset());
    }
}
