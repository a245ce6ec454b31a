//! The `console` module: structured logging from scripts.
//!
//! ```rhai
//! console::info("matched", #{ node: node, count: 3 }, extra);
//! ```
//!
//! A leading string is the message. A map after it becomes the event
//! fields, and every remaining argument lands JSON-encoded in `args`.

use crate::bridge::{DynamicObject, FromScript, ObjectHandle};
use crate::model::Value;
use rhai::{Dynamic, Engine, EvalAltResult, Module};
use serde_json::{Map as JsonMap, Value as Json};
use tracing::Level;

type Fallible<T> = Result<T, Box<EvalAltResult>>;

const DEFAULT_MESSAGE: &str = "script message";

/// Console verbs and the level each maps to. `debug` is a Rhai keyword,
/// so the debug level is spelled `dbg`.
const LEVELS: [(&str, Level); 6] = [
    ("log", Level::INFO),
    ("info", Level::INFO),
    ("warn", Level::WARN),
    ("error", Level::ERROR),
    ("dbg", Level::DEBUG),
    ("trace", Level::TRACE),
];

/// A console call split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Record {
    pub message: String,
    pub fields: JsonMap<String, Json>,
    pub args: Vec<Json>,
}

impl Record {
    pub(crate) fn parse(args: Vec<Dynamic>) -> Self {
        let mut args = args.into_iter().peekable();
        let message = match args.next_if(Dynamic::is_string) {
            Some(first) => first.into_string().unwrap_or_default(),
            None => DEFAULT_MESSAGE.to_string(),
        };

        let mut fields = JsonMap::new();
        if let Some(map) = args.next_if(is_map) {
            for (key, value) in entries(&map) {
                match Value::from_script(&value) {
                    Ok(value) => {
                        fields.insert(key, value.to_json());
                    }
                    Err(e) => {
                        fields.insert(format!("{key}_error"), Json::String(e.to_string()));
                    }
                }
            }
        }

        let args = args
            .map(|arg| match Value::from_script(&arg) {
                Ok(value) => value.to_json(),
                Err(e) => Json::String(format!("<{e}>")),
            })
            .collect();

        Self {
            message,
            fields,
            args,
        }
    }

    fn emit(&self, level: Level, pipe: &str) {
        let fields = Json::Object(self.fields.clone());
        let args = Json::Array(self.args.clone());
        let message = &self.message;
        if level == Level::ERROR {
            tracing::error!(pipe, %fields, %args, "{message}");
        } else if level == Level::WARN {
            tracing::warn!(pipe, %fields, %args, "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(pipe, %fields, %args, "{message}");
        } else if level == Level::TRACE {
            tracing::trace!(pipe, %fields, %args, "{message}");
        } else {
            tracing::info!(pipe, %fields, %args, "{message}");
        }
    }
}

fn is_map(value: &Dynamic) -> bool {
    value.is_map() || value.is::<ObjectHandle>()
}

fn entries(value: &Dynamic) -> Vec<(String, Dynamic)> {
    if let Some(map) = value.read_lock::<rhai::Map>() {
        return map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    }
    if let Some(handle) = value.read_lock::<ObjectHandle>() {
        return handle
            .keys()
            .into_iter()
            .map(|k| {
                let v = handle.peek(&k).unwrap_or(Dynamic::UNIT);
                (k, v)
            })
            .collect();
    }
    Vec::new()
}

/// Registers `console::<verb>` for one to four arguments, tagging every
/// event with `pipe`.
pub fn register_console(engine: &mut Engine, pipe: &str) {
    let mut module = Module::new();
    for (verb, level) in LEVELS {
        {
            let pipe = pipe.to_string();
            module.set_native_fn(verb, move |a: Dynamic| -> Fallible<()> {
                Record::parse(vec![a]).emit(level, &pipe);
                Ok(())
            });
        }
        {
            let pipe = pipe.to_string();
            module.set_native_fn(verb, move |a: Dynamic, b: Dynamic| -> Fallible<()> {
                Record::parse(vec![a, b]).emit(level, &pipe);
                Ok(())
            });
        }
        {
            let pipe = pipe.to_string();
            module.set_native_fn(
                verb,
                move |a: Dynamic, b: Dynamic, c: Dynamic| -> Fallible<()> {
                    Record::parse(vec![a, b, c]).emit(level, &pipe);
                    Ok(())
                },
            );
        }
        {
            let pipe = pipe.to_string();
            module.set_native_fn(
                verb,
                move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| -> Fallible<()> {
                    Record::parse(vec![a, b, c, d]).emit(level, &pipe);
                    Ok(())
                },
            );
        }
    }
    engine.register_static_module("console", module.into());

    let label = pipe.to_string();
    engine.on_print(move |text| tracing::info!(pipe = %label, "{text}"));
    let label = pipe.to_string();
    engine.on_debug(move |text, source, pos| {
        tracing::debug!(pipe = %label, source = source.unwrap_or(""), %pos, "{text}")
    });
}
