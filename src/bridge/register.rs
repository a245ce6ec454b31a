//! Engine registration of the bridge types.

use super::{
    DynamicArray, DynamicObject, FromScript, ListHandle, ListItem, LiveHandle, NodeHandle, Null,
    ObjectHandle, Timestamp,
};
use crate::config::MAX_LIST_LEN;
use crate::model::{Node, Value};
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, NativeCallContext, INT};

type Fallible<T> = Result<T, Box<EvalAltResult>>;

/// Registers every proxy type plus the `none()`, `is_none`, `is_unset`,
/// `parse_time` and `now_utc` helpers.
pub fn register_types(engine: &mut Engine) {
    register_null(engine);
    register_timestamp(engine);
    register_object::<ObjectHandle>(engine, ObjectHandle::TYPE_NAME);
    register_object::<NodeHandle>(engine, NodeHandle::TYPE_NAME);
    register_object::<LiveHandle>(engine, LiveHandle::TYPE_NAME);
    register_list::<Value>(engine);
    register_list::<Node>(engine);
}

fn register_null(engine: &mut Engine) {
    engine.register_type_with_name::<Null>("null");
    engine.register_fn("none", || Null);
    engine.register_fn("is_none", |v: Dynamic| v.is::<Null>());
    engine.register_fn("is_unset", |v: Dynamic| v.is_unit());
    engine.register_fn("==", |_: Null, _: Null| true);
    engine.register_fn("!=", |_: Null, _: Null| false);
    engine.register_fn("to_string", |_: &mut Null| "null".to_string());
    engine.register_fn("to_debug", |_: &mut Null| "null".to_string());
}

fn register_timestamp(engine: &mut Engine) {
    engine.register_type_with_name::<Timestamp>("Timestamp");
    engine.register_fn("parse_time", |s: &str| Timestamp::parse(s));
    engine.register_fn("now_utc", Timestamp::now);
    engine.register_fn("is_valid", |t: &mut Timestamp| t.is_valid());
    engine.register_fn("unix", |t: &mut Timestamp| t.unix() as INT);
    engine.register_fn("to_string", |t: &mut Timestamp| t.to_string());
    engine.register_fn("to_debug", |t: &mut Timestamp| t.to_string());
    engine.register_fn("==", |a: Timestamp, b: Timestamp| a == b);
    engine.register_fn("!=", |a: Timestamp, b: Timestamp| a != b);
    engine.register_fn("<", |a: Timestamp, b: Timestamp| a < b);
    engine.register_fn("<=", |a: Timestamp, b: Timestamp| a <= b);
    engine.register_fn(">", |a: Timestamp, b: Timestamp| a > b);
    engine.register_fn(">=", |a: Timestamp, b: Timestamp| a >= b);
}

/// JSON rendering used by `print` and `to_string`.
fn render(value: Dynamic) -> Fallible<String> {
    let value = Value::from_script(&value)?;
    Ok(value.to_json().to_string())
}

fn register_object<H>(engine: &mut Engine, name: &str)
where
    H: DynamicObject + Clone + Send + Sync + 'static,
{
    engine.register_type_with_name::<H>(name);
    engine.register_indexer_get(|h: &mut H, key: ImmutableString| -> Fallible<Dynamic> {
        Ok(h.get(&key)?)
    });
    engine.register_indexer_set(
        |h: &mut H, key: ImmutableString, value: Dynamic| -> Fallible<()> {
            Ok(h.set(&key, value)?)
        },
    );
    engine.register_fn("keys", |h: &mut H| -> Array {
        h.keys().into_iter().map(Dynamic::from).collect()
    });
    engine.register_fn("contains", |h: &mut H, key: ImmutableString| h.has(&key));
    engine.register_fn("remove", |h: &mut H, key: ImmutableString| -> Fallible<Dynamic> {
        Ok(h.delete(&key)?)
    });
    engine.register_fn("len", |h: &mut H| h.keys().len() as INT);
    engine.register_fn("to_string", |h: &mut H| render(Dynamic::from(h.clone())));
    engine.register_fn("to_debug", |h: &mut H| render(Dynamic::from(h.clone())));
}

/// Validates a list length requested by a script against the engine's
/// array size limit.
fn checked_len(ctx: &NativeCallContext, len: INT) -> Fallible<usize> {
    let Ok(len) = usize::try_from(len) else {
        return Err(EvalAltResult::ErrorArithmetic(
            format!("negative list length {len}"),
            ctx.position(),
        )
        .into());
    };
    let max = match ctx.engine().max_array_size() {
        0 => MAX_LIST_LEN,
        max => max,
    };
    if len > max {
        return Err(EvalAltResult::ErrorDataTooLarge("Size of list".into(), ctx.position()).into());
    }
    Ok(len)
}

fn register_list<T: ListItem>(engine: &mut Engine) {
    engine.register_type_with_name::<ListHandle<T>>(T::LIST_NAME);
    engine.register_indexer_get(|l: &mut ListHandle<T>, i: INT| -> Fallible<Dynamic> {
        Ok(DynamicArray::get(l, i)?)
    });
    engine.register_indexer_set(
        |ctx: NativeCallContext, l: &mut ListHandle<T>, i: INT, value: Dynamic| -> Fallible<()> {
            if i >= 0 {
                checked_len(&ctx, i.saturating_add(1))?;
            }
            Ok(DynamicArray::set(l, i, value)?)
        },
    );
    engine.register_fn("len", |l: &mut ListHandle<T>| l.len() as INT);
    engine.register_fn("is_empty", |l: &mut ListHandle<T>| l.is_empty());
    engine.register_get("length", |l: &mut ListHandle<T>| l.len() as INT);
    engine.register_set(
        "length",
        |ctx: NativeCallContext, l: &mut ListHandle<T>, len: INT| -> Fallible<()> {
            let len = checked_len(&ctx, len)?;
            Ok(l.set_len(len)?)
        },
    );
    engine.register_fn(
        "push",
        |ctx: NativeCallContext, l: &mut ListHandle<T>, value: Dynamic| -> Fallible<()> {
            checked_len(&ctx, l.len() as INT + 1)?;
            Ok(l.push(value)?)
        },
    );
    engine.register_fn("pop", |l: &mut ListHandle<T>| -> Fallible<Dynamic> { Ok(l.pop()?) });
    engine.register_fn("clear", |l: &mut ListHandle<T>| -> Fallible<()> { Ok(l.set_len(0)?) });
    engine.register_fn("to_string", |l: &mut ListHandle<T>| {
        render(Dynamic::from(l.clone()))
    });
    engine.register_fn("to_debug", |l: &mut ListHandle<T>| {
        render(Dynamic::from(l.clone()))
    });
    engine.register_iterator::<ListHandle<T>>();
}
