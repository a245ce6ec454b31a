use super::{
    acquire, as_string, descend, opt_from_dynamic, opt_to_dynamic, unexpected, DynamicObject,
    FromScript, IntoScript, Timestamp,
};
use crate::error::{Error, Result};
use crate::model::value::parse_time;
use crate::model::Live;
use crate::option::Opt;
use chrono::{DateTime, Utc};
use rhai::Dynamic;
use std::sync::{Arc, Mutex};

const SINCE: &str = "since";
const UNTIL: &str = "until";
/// `until` is reserved in Rhai, so `live.till` reads and writes the same
/// bound. `live["until"]` and `#{ "until": t }` work as well.
const TILL: &str = "till";

#[derive(Debug, Default)]
struct LazyLive {
    proto: Live,
    since: Option<Dynamic>,
    until: Option<Dynamic>,
}

impl LazyLive {
    fn slot(&mut self, key: &str) -> Option<(&mut Option<Dynamic>, &Opt<DateTime<Utc>>)> {
        match key {
            SINCE => Some((&mut self.since, &self.proto.since)),
            UNTIL | TILL => Some((&mut self.until, &self.proto.until)),
            _ => None,
        }
    }
}

/// Lazy proxy over a validity window, exposing `since` and `until` as
/// [`Timestamp`]s.
#[derive(Debug, Clone, Default)]
pub struct LiveHandle(Arc<Mutex<LazyLive>>);

impl LiveHandle {
    pub const TYPE_NAME: &'static str = "Live";

    pub fn new(proto: Live) -> Self {
        Self(Arc::new(Mutex::new(LazyLive {
            proto,
            ..LazyLive::default()
        })))
    }

    pub fn write_back(&self, depth: usize) -> Result<Live> {
        descend(depth)?;
        let state = acquire(&self.0, Self::TYPE_NAME)?;
        let mut live = state.proto;
        if let Some(value) = &state.since {
            live.since = bound_from_dynamic(value)?;
        }
        if let Some(value) = &state.until {
            live.until = bound_from_dynamic(value)?;
        }
        Ok(live)
    }
}

/// A window bound written by a script: a timestamp or an RFC-3339 string.
/// Anything unparseable degrades to explicit none.
pub(crate) fn bound_from_dynamic(value: &Dynamic) -> Result<Opt<DateTime<Utc>>> {
    let bound = opt_from_dynamic(value, |v| {
        if let Some(ts) = v.read_lock::<Timestamp>() {
            return Ok(ts.0);
        }
        if v.is_string() {
            return Ok(parse_time(&as_string(v, "Timestamp")?));
        }
        Err(unexpected(v, "Timestamp"))
    })?;
    Ok(match bound {
        Opt::Some(None) => Opt::None,
        Opt::Some(Some(t)) => Opt::Some(t),
        Opt::None => Opt::None,
        Opt::Unset => Opt::Unset,
    })
}

fn bound_to_dynamic(bound: &Opt<DateTime<Utc>>) -> Dynamic {
    opt_to_dynamic(bound, |t| Dynamic::from(Timestamp::from(*t)))
}

impl DynamicObject for LiveHandle {
    fn get(&self, key: &str) -> Result<Dynamic> {
        let mut state = acquire(&self.0, Self::TYPE_NAME)?;
        let Some((slot, proto)) = state.slot(key) else {
            return Ok(Dynamic::UNIT);
        };
        if let Some(value) = slot {
            return Ok(value.clone());
        }
        if proto.is_unset() {
            return Ok(Dynamic::UNIT);
        }
        let value = bound_to_dynamic(proto);
        *slot = Some(value.clone());
        Ok(value)
    }

    fn set(&self, key: &str, value: Dynamic) -> Result<()> {
        let mut state = acquire(&self.0, Self::TYPE_NAME)?;
        let Some((slot, _)) = state.slot(key) else {
            return Err(Error::unexpected(format!("key {key:?}"), Self::TYPE_NAME));
        };
        *slot = Some(value);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        let key = if key == TILL { UNTIL } else { key };
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
        let present = |slot: &Option<Dynamic>, proto: &Opt<DateTime<Utc>>| match slot {
            Some(value) => !value.is_unit(),
            None => !proto.is_unset(),
        };
        let mut keys = Vec::new();
        if present(&state.since, &state.proto.since) {
            keys.push(SINCE.to_string());
        }
        if present(&state.until, &state.proto.until) {
            keys.push(UNTIL.to_string());
        }
        keys
    }
}

impl IntoScript for Live {
    fn into_script(&self) -> Dynamic {
        Dynamic::from(LiveHandle::new(*self))
    }
}

impl FromScript for Live {
    const TYPE_NAME: &'static str = "Live";

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Live> {
        if let Some(handle) = value.read_lock::<LiveHandle>() {
            return handle.write_back(depth);
        }
        if let Some(map) = value.read_lock::<rhai::Map>() {
            descend(depth)?;
            let mut live = Live::default();
            for (key, bound) in map.iter() {
                match key.as_str() {
                    SINCE => live.since = bound_from_dynamic(bound)?,
                    UNTIL | TILL => live.until = bound_from_dynamic(bound)?,
                    other => return Err(Error::unexpected(format!("key {other:?}"), Self::TYPE_NAME)),
                }
            }
            return Ok(live);
        }
        Err(unexpected(value, Self::TYPE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Null;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_read_and_untouched_round_trip() {
        let live = Live {
            since: Opt::Some(at(1)),
            until: Opt::None,
        };
        let handle = LiveHandle::new(live);
        let since = handle.get("since").unwrap();
        assert_eq!(since.read_lock::<Timestamp>().unwrap().0, Some(at(1)));
        assert!(handle.get("until").unwrap().is::<Null>());
        assert_eq!(handle.keys(), vec!["since", "until"]);
        assert_eq!(handle.write_back(0).unwrap(), live);
    }

    #[test]
    fn test_write_string_timestamp_and_delete() {
        let handle = LiveHandle::new(Live::new(at(1), at(2)));
        handle
            .set("until", Dynamic::from("2024-06-09T00:00:00Z".to_string()))
            .unwrap();
        handle.delete("since").unwrap();
        let live = handle.write_back(0).unwrap();
        assert!(live.since.is_unset());
        assert_eq!(live.until, Opt::Some(at(9)));
        assert_eq!(handle.keys(), vec!["until"]);
    }

    #[test]
    fn test_invalid_time_becomes_none() {
        let handle = LiveHandle::new(Live::default());
        handle.set("since", Dynamic::from(Timestamp::parse("garbage"))).unwrap();
        assert!(handle.write_back(0).unwrap().since.is_none());
    }

    #[test]
    fn test_till_aliases_until() {
        let handle = LiveHandle::new(Live::new(at(1), at(2)));
        let till = handle.get("till").unwrap();
        assert_eq!(till.read_lock::<Timestamp>().unwrap().0, Some(at(2)));
        handle.set("till", Dynamic::from(Timestamp::from(at(5)))).unwrap();
        assert_eq!(handle.write_back(0).unwrap().until, Opt::Some(at(5)));
        assert_eq!(handle.keys(), vec!["since", "until"]);

        let map: rhai::Map = [("till".into(), Dynamic::from(Timestamp::from(at(3))))]
            .into_iter()
            .collect();
        let live = Live::from_script(&Dynamic::from_map(map)).unwrap();
        assert_eq!(live.until, Opt::Some(at(3)));
    }

    #[test]
    fn test_unknown_key() {
        let handle = LiveHandle::new(Live::default());
        assert!(handle.get("other").unwrap().is_unit());
        assert!(handle.set("other", Dynamic::UNIT).is_err());
    }
}
