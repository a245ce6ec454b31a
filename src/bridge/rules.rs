//! Script → host conversion of `When`, `Then` and `Case`, used by
//! `this.notify(case)`.

use super::{
    as_string, descend, opt_from_dynamic, unexpected, DynamicObject, FromScript, ListHandle, Null,
    ObjectHandle,
};
use crate::error::{Error, Result};
use crate::model::{Case, Hook, Live, Meta, Then, Value, When};
use crate::option::Opt;
use rhai::{Array, Dynamic};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Key/value pairs of a script map or object proxy.
fn entries(value: &Dynamic, dst: &str) -> Result<Vec<(String, Dynamic)>> {
    if let Some(map) = value.read_lock::<rhai::Map>() {
        return Ok(map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect());
    }
    if let Some(handle) = value.read_lock::<ObjectHandle>() {
        return handle
            .keys()
            .into_iter()
            .map(|k| handle.peek(&k).map(|v| (k, v)))
            .collect();
    }
    Err(unexpected(value, dst))
}

/// Items of a script array or list proxy, `()` and `none()` skipped.
fn items(value: &Dynamic, dst: &str) -> Result<Vec<Dynamic>> {
    let all = if let Some(array) = value.read_lock::<Array>() {
        array.clone()
    } else if let Some(handle) = value.read_lock::<ListHandle<Value>>() {
        handle.values()?
    } else {
        return Err(unexpected(value, dst));
    };
    Ok(all
        .into_iter()
        .filter(|v| !v.is_unit() && !v.is::<Null>())
        .collect())
}

fn unknown_key(key: &str, dst: &str) -> Error {
    Error::unexpected(format!("key {key:?}"), dst)
}

impl FromScript for When {
    const TYPE_NAME: &'static str = "When";

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<When> {
        let depth = descend(depth)?;
        let mut when = When::default();
        for (key, v) in entries(value, Self::TYPE_NAME)? {
            match key.as_str() {
                "uuid" => {
                    when.uuid = opt_from_dynamic(&v, |v| {
                        items(v, "uuid")?
                            .iter()
                            .map(|id| {
                                let s = as_string(id, "Uuid")?;
                                Uuid::parse_str(&s)
                                    .map_err(|_| Error::unexpected(format!("string {s:?}"), "Uuid"))
                            })
                            .collect::<Result<BTreeSet<_>>>()
                    })?
                }
                "kind" => {
                    when.kind = opt_from_dynamic(&v, |v| {
                        items(v, "kind")?
                            .iter()
                            .map(|k| as_string(k, "Kind"))
                            .collect::<Result<BTreeSet<_>>>()
                    })?
                }
                "hook" => {
                    when.hook = opt_from_dynamic(&v, |v| {
                        items(v, "hook")?
                            .iter()
                            .map(|h| Hook::from_script_at(h, depth))
                            .collect::<Result<Vec<_>>>()
                    })?
                }
                "live" => {
                    when.live = opt_from_dynamic(&v, |v| {
                        items(v, "live")?
                            .iter()
                            .map(|l| Live::from_script_at(l, depth))
                            .collect::<Result<Vec<_>>>()
                    })?
                }
                other => return Err(unknown_key(other, Self::TYPE_NAME)),
            }
        }
        Ok(when)
    }
}

impl FromScript for Then {
    const TYPE_NAME: &'static str = "Then";

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Then> {
        let depth = descend(depth)?;
        let mut then = Then::default();
        for (key, v) in entries(value, Self::TYPE_NAME)? {
            match key.as_str() {
                "kind" => then.kind = opt_from_dynamic(&v, |v| as_string(v, "Kind"))?,
                "meta" => then.meta = opt_from_dynamic(&v, |v| Meta::from_script_at(v, depth))?,
                "hook" => then.hook = opt_from_dynamic(&v, |v| Hook::from_script_at(v, depth))?,
                "live" => then.live = opt_from_dynamic(&v, |v| Live::from_script_at(v, depth))?,
                other => return Err(unknown_key(other, Self::TYPE_NAME)),
            }
        }
        Ok(then)
    }
}

impl FromScript for Case {
    const TYPE_NAME: &'static str = "Case";

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Case> {
        let depth = descend(depth)?;
        let mut case = Case::default();
        for (key, v) in entries(value, Self::TYPE_NAME)? {
            match key.as_str() {
                "when" => case.when = opt_from_dynamic(&v, |v| When::from_script_at(v, depth))?,
                "then" => case.then = opt_from_dynamic(&v, |v| Then::from_script_at(v, depth))?,
                other => return Err(unknown_key(other, Self::TYPE_NAME)),
            }
        }
        Ok(case)
    }
}

impl<T: FromScript> FromScript for Opt<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Opt<T>> {
        opt_from_dynamic(value, |v| T::from_script_at(v, depth))
    }
}
