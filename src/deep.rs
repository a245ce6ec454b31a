//! Deep semantics over nested [`Value`]s.
//!
//! These are the recursive algorithms underneath `Meta`/`Hook` merging and
//! `When` hook matching:
//!
//! - [`deep_copy`] - structural clone
//! - [`deep_with`] - merge-with-override, additive only under `$`-prefixed keys
//! - [`deep_have`] - structural containment (pattern matching)
//! - [`deep_equal`] - type-and-value equality

use crate::model::value::Value;

/// Prefix that switches a key into additive merge mode.
pub const MERGE_PREFIX: char = '$';

/// Whether values under `key` merge instead of replace.
pub fn is_merge_key(key: &str) -> bool {
    key.starts_with(MERGE_PREFIX)
}

/// Recursively copies `v`. Every `Value` owns its children, so this never
/// shares structure with the input.
pub fn deep_copy(v: &Value) -> Value {
    match v {
        Value::List(l) => Value::List(l.iter().map(deep_copy).collect()),
        Value::Map(m) => Value::Map(m.iter().map(|(k, v)| (k.clone(), deep_copy(v))).collect()),
        scalar => scalar.clone(),
    }
}

/// Applies patch `r` over `l`.
///
/// - map + map, `merge`: every `r` key is written into `l`, recursing with
///   `merge` set only for `$`-prefixed keys.
/// - map + map, no `merge`: `r` wins, but each of its keys is still recursed
///   against `l`'s value so nested `$` keys keep merging.
/// - list + list, `merge`: concatenation.
/// - otherwise `r` replaces `l`.
///
/// A nested `{}` under a plain key therefore clears the receiver's value.
/// Only a whole empty patch is a no-op, see `Meta::with`.
pub fn deep_with(l: Value, r: Value, merge: bool) -> Value {
    match (l, r) {
        (Value::Map(mut l), Value::Map(r)) => {
            if merge {
                for (k, v) in r {
                    let cur = l.remove(&k).unwrap_or_default();
                    let merged = deep_with(cur, v, is_merge_key(&k));
                    l.insert(k, merged);
                }
                Value::Map(l)
            } else {
                let mut out = r;
                for (k, v) in out.iter_mut() {
                    let cur = l.remove(k).unwrap_or_default();
                    *v = deep_with(cur, std::mem::take(v), is_merge_key(k));
                }
                Value::Map(out)
            }
        }
        (Value::List(mut l), Value::List(r)) if merge => {
            l.extend(r);
            Value::List(l)
        }
        (_, r) => r,
    }
}

/// True when `source` structurally contains `pattern`.
///
/// Map patterns require every pattern key to be contained by the source's
/// value at that key (a missing key reads as null). List patterns require
/// each element to be contained by at least one source element, in any
/// order. Scalars compare with [`deep_equal`].
pub fn deep_have(source: &Value, pattern: &Value) -> bool {
    match source {
        Value::Map(source) => match pattern {
            Value::Map(pattern) => pattern.iter().all(|(k, p)| match source.get(k) {
                Some(s) => deep_have(s, p),
                None => deep_have(&Value::Null, p),
            }),
            _ => false,
        },
        Value::List(source) => match pattern {
            Value::List(pattern) => pattern
                .iter()
                .all(|p| source.iter().any(|s| deep_have(s, p))),
            _ => false,
        },
        scalar => deep_equal(scalar, pattern),
    }
}

/// Type-and-value equality. Lists compare in order, maps by identical key
/// sets, timestamps by instant.
pub fn deep_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Time(a), Value::Time(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, a)| b.get(k).is_some_and(|b| deep_equal(a, b)))
        }
        _ => false,
    }
}
