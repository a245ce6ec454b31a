//! `Meta` (free-form user data) and `Hook` (data matched by `When`).
//!
//! Both are string-keyed maps of [`Value`] that merge through
//! [`deep_with`](crate::deep::deep_with).

use super::value::{Map, Value};
use crate::deep::{deep_with, is_merge_key};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

macro_rules! value_map {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Map);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// Deep-merges `patch` over `self`. Keys starting with `$` merge
            /// additively, every other key is replaced. An empty patch is a
            /// no-op; an empty map nested under a key replaces that key.
            pub fn with(mut self, patch: $name) -> $name {
                if self.0.is_empty() {
                    return patch;
                }
                if patch.0.is_empty() {
                    return self;
                }
                for (k, v) in patch.0 {
                    let cur = self.0.remove(&k).unwrap_or_default();
                    let merged = deep_with(cur, v, is_merge_key(&k));
                    self.0.insert(k, merged);
                }
                self
            }

            pub fn into_inner(self) -> Map {
                self.0
            }

            /// Builder-style insert.
            pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
                self.0.insert(key.into(), value.into());
                self
            }
        }

        impl Deref for $name {
            type Target = Map;

            fn deref(&self) -> &Map {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Map {
                &mut self.0
            }
        }

        impl From<Map> for $name {
            fn from(map: Map) -> Self {
                Self(map)
            }
        }

        impl From<$name> for Value {
            fn from(map: $name) -> Value {
                Value::Map(map.0)
            }
        }

        impl FromIterator<(String, Value)> for $name {
            fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
                Self(iter.into_iter().collect())
            }
        }
    };
}

value_map!(
    /// Free-form user data carried by a Node.
    Meta
);

value_map!(
    /// Structured data used by `When` hook patterns.
    Hook
);

impl Hook {
    /// True when this hook structurally contains `pattern`.
    pub fn have(&self, pattern: &Hook) -> bool {
        pattern.0.iter().all(|(k, p)| {
            let s = self.0.get(k).unwrap_or(&Value::Null);
            crate::deep::deep_have(s, p)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(json: serde_json::Value) -> Meta {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_with_short_circuits_empty_sides() {
        let m = meta(json!({"a": 1}));
        assert_eq!(Meta::new().with(m.clone()), m);
        assert_eq!(m.clone().with(Meta::new()), m);
    }

    #[test]
    fn test_with_merges_dollar_keys_and_replaces_others() {
        let out = meta(json!({"a": {"x": 1}, "$b": {"x": 1}, "$l": [1]}))
            .with(meta(json!({"a": {"y": 2}, "$b": {"y": 2}, "$l": [2]})));
        assert_eq!(
            out,
            meta(json!({"a": {"y": 2}, "$b": {"x": 1, "y": 2}, "$l": [1, 2]}))
        );
    }

    #[test]
    fn test_with_nested_empty_map_clears_value() {
        let out = meta(json!({"a": {"x": 1}, "b": 2})).with(meta(json!({"a": {}})));
        assert_eq!(out.get("a"), Some(&Value::Map(Map::new())));
        assert_eq!(out.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_hook_have() {
        let hook: Hook = serde_json::from_value(json!({"kind": "cat", "age": 3})).unwrap();
        let pattern: Hook = serde_json::from_value(json!({"kind": "cat"})).unwrap();
        let other: Hook = serde_json::from_value(json!({"kind": "dog"})).unwrap();
        assert!(hook.have(&pattern));
        assert!(!hook.have(&other));
        assert!(hook.have(&Hook::new()));
    }
}
