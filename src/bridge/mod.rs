//! Host ↔ script value bridge.
//!
//! Host aggregates reach the script as lazy, copy-on-write proxies rather
//! than eagerly converted Rhai maps and arrays. Each proxy keeps the host
//! value as a read-only `proto` and a per-key (or per-index) `overlay`
//! that is only populated when the script touches that key:
//!
//! - untouched keys reflect `proto`
//! - a read converts `proto[key]` once and caches the script value
//! - writing `()` deletes the key (it leaves enumeration and write-back)
//! - writing `none()` reconciles to an explicit absence
//! - any other value is stored verbatim and converted back on write-back
//!
//! | host type | script type name | proxy |
//! |-----------|------------------|-------|
//! | `Node` | `Node` | [`NodeHandle`] |
//! | `Vec<Node>` | `NodeList` | [`ListHandle<Node>`] |
//! | `Meta`, `Hook`, `Map` | `Object` | [`ObjectHandle`] |
//! | `Vec<Value>` | `List` | [`ListHandle<Value>`] |
//! | `Live` | `Live` | [`LiveHandle`] |
//! | `DateTime<Utc>` | `Timestamp` | [`Timestamp`] |
//!
//! [`IntoScript`] and [`FromScript`] form the conversion dispatch; any
//! pairing they do not list fails with [`Error::UnexpectedType`].

mod list;
mod live;
mod node;
mod object;
mod register;
mod rules;
mod time;

pub use list::{ListHandle, ListItem};
pub use live::LiveHandle;
pub use node::NodeHandle;
pub use object::ObjectHandle;
pub use register::register_types;
pub use time::Timestamp;

use crate::error::{Error, Result};
use crate::model::{Map, Value};
use crate::option::Opt;
use rhai::{Array, Dynamic, INT};
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Maximum nesting of script values converted back to host values.
pub const MAX_DEPTH: usize = 64;

/// Explicit-none marker, created in scripts with `none()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Null;

impl Null {
    pub fn dynamic() -> Dynamic {
        Dynamic::from(Null)
    }
}

/// Key/value proxy contract shared by the object-like handles.
pub trait DynamicObject {
    fn get(&self, key: &str) -> Result<Dynamic>;
    fn set(&self, key: &str, value: Dynamic) -> Result<()>;
    fn has(&self, key: &str) -> bool;
    /// Marks `key` deleted and returns what it held.
    fn delete(&self, key: &str) -> Result<Dynamic>;
    fn keys(&self) -> Vec<String>;
}

/// Index proxy contract for the list handles.
pub trait DynamicArray {
    fn get(&self, index: INT) -> Result<Dynamic>;
    fn set(&self, index: INT, value: Dynamic) -> Result<()>;
    fn len(&self) -> usize;
    fn set_len(&self, len: usize) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Host value that can be handed to a script.
pub trait IntoScript {
    fn into_script(&self) -> Dynamic;
}

/// Host value that can be rebuilt from a script value.
pub trait FromScript: Sized {
    /// Type name used in conversion errors.
    const TYPE_NAME: &'static str;

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Self>;

    fn from_script(value: &Dynamic) -> Result<Self> {
        Self::from_script_at(value, 0)
    }
}

pub fn to_dynamic<T: IntoScript + ?Sized>(value: &T) -> Dynamic {
    value.into_script()
}

pub fn from_dynamic<T: FromScript>(value: &Dynamic) -> Result<T> {
    T::from_script(value)
}

/// Converts a tri-state host field: unset → `()`, none → `none()`.
pub(crate) fn opt_to_dynamic<T>(field: &Opt<T>, f: impl FnOnce(&T) -> Dynamic) -> Dynamic {
    match field {
        Opt::Unset => Dynamic::UNIT,
        Opt::None => Null::dynamic(),
        Opt::Some(v) => f(v),
    }
}

/// Inverse of [`opt_to_dynamic`].
pub(crate) fn opt_from_dynamic<T>(
    value: &Dynamic,
    f: impl FnOnce(&Dynamic) -> Result<T>,
) -> Result<Opt<T>> {
    if value.is_unit() {
        Ok(Opt::Unset)
    } else if value.is::<Null>() {
        Ok(Opt::None)
    } else {
        f(value).map(Opt::Some)
    }
}

pub(crate) fn descend(depth: usize) -> Result<usize> {
    if depth >= MAX_DEPTH {
        return Err(Error::Nesting(MAX_DEPTH));
    }
    Ok(depth + 1)
}

pub(crate) fn unexpected(value: &Dynamic, dst: &str) -> Error {
    Error::unexpected(value.type_name(), dst)
}

/// Locks a proxy's state. Contention can only come from a proxy reaching
/// itself during conversion, which is reported as a cycle.
pub(crate) fn acquire<'a, T>(state: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>> {
    match state.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => Err(Error::unexpected("cyclic reference", name)),
    }
}

pub(crate) fn as_string(value: &Dynamic, dst: &str) -> Result<String> {
    if value.is_string() {
        return Ok(value.clone().into_string().unwrap_or_default());
    }
    if let Ok(c) = value.as_char() {
        return Ok(c.to_string());
    }
    Err(unexpected(value, dst))
}

impl IntoScript for Value {
    fn into_script(&self) -> Dynamic {
        match self {
            Value::Null => Null::dynamic(),
            Value::Bool(b) => Dynamic::from_bool(*b),
            Value::Int(i) => Dynamic::from_int(*i),
            Value::Float(f) => Dynamic::from_float(*f),
            Value::String(s) => Dynamic::from(s.clone()),
            Value::Time(t) => Dynamic::from(Timestamp::from(*t)),
            Value::List(items) => Dynamic::from(ListHandle::new(items.clone())),
            Value::Map(map) => Dynamic::from(ObjectHandle::new(map.clone())),
        }
    }
}

impl FromScript for Value {
    const TYPE_NAME: &'static str = "Value";

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Value> {
        let depth = descend(depth)?;
        let value = value.flatten_clone();

        if value.is_unit() || value.is::<Null>() {
            return Ok(Value::Null);
        }
        if let Ok(b) = value.as_bool() {
            return Ok(Value::Bool(b));
        }
        if let Ok(i) = value.as_int() {
            return Ok(Value::Int(i));
        }
        if let Ok(f) = value.as_float() {
            return Ok(Value::Float(f));
        }
        if value.is_string() || value.is_char() {
            return as_string(&value, Self::TYPE_NAME).map(Value::String);
        }
        if let Some(t) = value.read_lock::<Timestamp>() {
            return Ok(t.to_value());
        }
        if let Some(map) = value.read_lock::<rhai::Map>() {
            return map_from_rhai(&map, depth).map(Value::Map);
        }
        if let Some(items) = value.read_lock::<Array>() {
            return list_from_rhai(&items, depth).map(Value::List);
        }
        if let Some(handle) = value.read_lock::<ObjectHandle>() {
            return handle.write_back(depth).map(Value::Map);
        }
        if let Some(handle) = value.read_lock::<ListHandle<Value>>() {
            return handle.write_back(depth).map(Value::List);
        }
        if let Some(handle) = value.read_lock::<NodeHandle>() {
            return handle.write_back(depth).map(|n| n.to_value());
        }
        if let Some(handle) = value.read_lock::<ListHandle<crate::model::Node>>() {
            let nodes = handle.write_back(depth)?;
            return Ok(Value::List(nodes.iter().map(|n| n.to_value()).collect()));
        }
        if let Some(handle) = value.read_lock::<LiveHandle>() {
            return handle.write_back(depth).map(|live| live_to_value(&live));
        }
        Err(unexpected(&value, Self::TYPE_NAME))
    }
}

fn live_to_value(live: &crate::model::Live) -> Value {
    let mut map = Map::new();
    let mut put = |key: &str, bound: &Opt<chrono::DateTime<chrono::Utc>>| match bound {
        Opt::Unset => {}
        Opt::None => {
            map.insert(key.to_string(), Value::Null);
        }
        Opt::Some(t) => {
            map.insert(key.to_string(), Value::String(crate::model::value::format_time(t)));
        }
    };
    put("since", &live.since);
    put("until", &live.until);
    Value::Map(map)
}

/// Script-built map to host map; `()` entries are dropped.
pub(crate) fn map_from_rhai(map: &rhai::Map, depth: usize) -> Result<Map> {
    let mut out = Map::new();
    for (k, v) in map.iter() {
        if v.is_unit() {
            continue;
        }
        out.insert(k.to_string(), Value::from_script_at(v, depth)?);
    }
    Ok(out)
}

/// Script-built array to host list; `()` items are dropped.
pub(crate) fn list_from_rhai(items: &Array, depth: usize) -> Result<Vec<Value>> {
    items
        .iter()
        .filter(|v| !v.is_unit())
        .map(|v| Value::from_script_at(v, depth))
        .collect()
}
