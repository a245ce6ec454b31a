use super::{acquire, descend, map_from_rhai, unexpected, DynamicObject, FromScript, IntoScript};
use crate::error::Result;
use crate::model::{Hook, Map, Meta, Value};
use rhai::Dynamic;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct LazyObject {
    proto: Map,
    overlay: BTreeMap<String, Dynamic>,
}

/// Lazy proxy over a string-keyed host map (`Meta`, `Hook`, nested maps).
#[derive(Debug, Clone, Default)]
pub struct ObjectHandle(Arc<Mutex<LazyObject>>);

impl ObjectHandle {
    pub const TYPE_NAME: &'static str = "Object";

    pub fn new(proto: Map) -> Self {
        Self(Arc::new(Mutex::new(LazyObject {
            proto,
            overlay: BTreeMap::new(),
        })))
    }

    /// Value under `key` without caching it in the overlay, so inspecting
    /// a field never counts as writing it.
    pub fn peek(&self, key: &str) -> Result<Dynamic> {
        let state = acquire(&self.0, Self::TYPE_NAME)?;
        if let Some(value) = state.overlay.get(key) {
            return Ok(value.clone());
        }
        Ok(state
            .proto
            .get(key)
            .map(IntoScript::into_script)
            .unwrap_or(Dynamic::UNIT))
    }

    /// Reconciles the overlay into a copy of the prototype.
    pub fn write_back(&self, depth: usize) -> Result<Map> {
        let depth = descend(depth)?;
        let state = acquire(&self.0, Self::TYPE_NAME)?;
        let mut out = state.proto.clone();
        for (key, value) in &state.overlay {
            if value.is_unit() {
                out.remove(key);
            } else {
                out.insert(key.clone(), Value::from_script_at(value, depth)?);
            }
        }
        Ok(out)
    }
}

impl DynamicObject for ObjectHandle {
    fn get(&self, key: &str) -> Result<Dynamic> {
        let mut state = acquire(&self.0, Self::TYPE_NAME)?;
        if let Some(value) = state.overlay.get(key) {
            return Ok(value.clone());
        }
        let Some(proto) = state.proto.get(key) else {
            return Ok(Dynamic::UNIT);
        };
        let value = proto.into_script();
        state.overlay.insert(key.to_string(), value.clone());
        Ok(value)
    }

    fn set(&self, key: &str, value: Dynamic) -> Result<()> {
        let mut state = acquire(&self.0, Self::TYPE_NAME)?;
        state.overlay.insert(key.to_string(), value);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        let Ok(state) = acquire(&self.0, Self::TYPE_NAME) else {
            return false;
        };
        match state.overlay.get(key) {
            Some(value) => !value.is_unit(),
            None => state.proto.contains_key(key),
        }
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
        let mut keys: Vec<String> = state
            .overlay
            .iter()
            .filter(|(_, v)| !v.is_unit())
            .map(|(k, _)| k.clone())
            .collect();
        keys.extend(
            state
                .proto
                .keys()
                .filter(|k| !state.overlay.contains_key(*k))
                .cloned(),
        );
        keys.sort();
        keys
    }
}

impl IntoScript for Map {
    fn into_script(&self) -> Dynamic {
        Dynamic::from(ObjectHandle::new(self.clone()))
    }
}

impl FromScript for Map {
    const TYPE_NAME: &'static str = "Map";

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Map> {
        if let Some(handle) = value.read_lock::<ObjectHandle>() {
            return handle.write_back(depth);
        }
        if let Some(map) = value.read_lock::<rhai::Map>() {
            return map_from_rhai(&map, descend(depth)?);
        }
        Err(unexpected(value, Self::TYPE_NAME))
    }
}

macro_rules! map_newtype_bridge {
    ($ty:ident) => {
        impl IntoScript for $ty {
            fn into_script(&self) -> Dynamic {
                self.0.into_script()
            }
        }

        impl FromScript for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn from_script_at(value: &Dynamic, depth: usize) -> Result<$ty> {
                if !value.is::<ObjectHandle>() && !value.is_map() {
                    return Err(unexpected(value, Self::TYPE_NAME));
                }
                Map::from_script_at(value, depth).map($ty)
            }
        }
    };
}

map_newtype_bridge!(Meta);
map_newtype_bridge!(Hook);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Null;
    use serde_json::json;

    fn proto() -> Map {
        Value::from(json!({"a": 1, "b": {"c": "d"}, "e": [1, 2]}))
            .as_map()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_untouched_round_trip() {
        let handle = ObjectHandle::new(proto());
        assert_eq!(handle.write_back(0).unwrap(), proto());
    }

    #[test]
    fn test_read_caches_and_nested_write_lands() {
        let handle = ObjectHandle::new(proto());
        let nested = handle.get("b").unwrap();
        let nested = nested.read_lock::<ObjectHandle>().unwrap().clone();
        nested.set("c", Dynamic::from("z".to_string())).unwrap();

        let out = handle.write_back(0).unwrap();
        assert_eq!(out.get("b"), Some(&Value::from(json!({"c": "z"}))));
    }

    #[test]
    fn test_delete_none_and_set() {
        let handle = ObjectHandle::new(proto());
        assert_eq!(handle.delete("a").unwrap().as_int().unwrap(), 1);
        handle.set("e", Null::dynamic()).unwrap();
        handle.set("f", Dynamic::from_bool(true)).unwrap();

        assert!(!handle.has("a"));
        assert!(handle.has("e"));
        assert_eq!(handle.keys(), vec!["b", "e", "f"]);

        let out = handle.write_back(0).unwrap();
        assert!(!out.contains_key("a"));
        assert_eq!(out.get("e"), Some(&Value::Null));
        assert_eq!(out.get("f"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_peek_leaves_overlay_alone() {
        let t = chrono::Utc::now();
        let mut map = proto();
        map.insert("t".into(), Value::Time(t));
        let handle = ObjectHandle::new(map.clone());

        assert!(handle.peek("t").unwrap().is::<crate::bridge::Timestamp>());
        assert!(handle.peek("b").unwrap().is::<ObjectHandle>());
        assert!(handle.peek("nope").unwrap().is_unit());
        assert!(acquire(&handle.0, ObjectHandle::TYPE_NAME).unwrap().overlay.is_empty());

        handle.set("a", Dynamic::from_int(9)).unwrap();
        assert_eq!(handle.peek("a").unwrap().as_int().unwrap(), 9);
    }

    #[test]
    fn test_cached_time_round_trips_typed() {
        let t = chrono::Utc::now();
        let mut map = Map::new();
        map.insert("t".into(), Value::Time(t));
        let handle = ObjectHandle::new(map.clone());
        handle.get("t").unwrap();
        assert_eq!(handle.write_back(0).unwrap(), map);
    }

    #[test]
    fn test_missing_key_reads_unit() {
        let handle = ObjectHandle::new(Map::new());
        assert!(handle.get("nope").unwrap().is_unit());
        assert!(handle.keys().is_empty());
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let handle = ObjectHandle::new(Map::new());
        handle.set("me", Dynamic::from(handle.clone())).unwrap();
        let err = handle.write_back(0).unwrap_err();
        assert!(err.to_string().contains("cyclic reference"));
    }

    #[test]
    fn test_meta_rejects_scalars() {
        assert!(Meta::from_script(&Dynamic::from_int(1)).is_err());
        let meta = Meta::from_script(&Dynamic::from(ObjectHandle::new(proto()))).unwrap();
        assert_eq!(meta.0, proto());
    }
}
