use super::{acquire, descend, unexpected, DynamicArray, FromScript, IntoScript};
use crate::error::{Error, Result};
use crate::model::{Node, Value};
use rhai::{Array, Dynamic, INT};
use std::sync::{Arc, Mutex};

/// Element type of a [`ListHandle`].
pub trait ListItem: FromScript + IntoScript + Clone + Send + Sync + 'static {
    /// Script type name of the list holding this item.
    const LIST_NAME: &'static str;
}

impl ListItem for Value {
    const LIST_NAME: &'static str = "List";
}

impl ListItem for Node {
    const LIST_NAME: &'static str = "NodeList";
}

/// Overlay slot: `None` is untouched and reflects the prototype, `()` is
/// deleted, anything else is the script value at that index.
type Slot = Option<Dynamic>;

#[derive(Debug)]
struct LazyList<T> {
    proto: Vec<T>,
    overlay: Option<Vec<Slot>>,
}

impl<T> LazyList<T> {
    fn len(&self) -> usize {
        match &self.overlay {
            Some(overlay) => overlay.len(),
            None => self.proto.len(),
        }
    }

    fn overlay_mut(&mut self) -> &mut Vec<Slot> {
        let proto_len = self.proto.len();
        self.overlay.get_or_insert_with(|| vec![None; proto_len])
    }
}

/// Resolves a possibly negative index against `len`.
fn normalize(index: INT, len: usize) -> Option<usize> {
    let index = if index < 0 { index + len as INT } else { index };
    usize::try_from(index).ok()
}

/// Lazy proxy over a host list.
pub struct ListHandle<T>(Arc<Mutex<LazyList<T>>>);

impl<T> Clone for ListHandle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ListHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ListHandle").field(&self.0).finish()
    }
}

impl<T: ListItem> ListHandle<T> {
    pub fn new(proto: Vec<T>) -> Self {
        Self(Arc::new(Mutex::new(LazyList {
            proto,
            overlay: None,
        })))
    }

    /// Reconciles the overlay into the prototype.
    ///
    /// Walking the overlay with a result cursor: untouched slots keep the
    /// prototype element, `()` slots remove the element under the cursor,
    /// values overwrite it or append past the end.
    pub fn write_back(&self, depth: usize) -> Result<Vec<T>> {
        let depth = descend(depth)?;
        let state = acquire(&self.0, T::LIST_NAME)?;
        let Some(overlay) = &state.overlay else {
            return Ok(state.proto.clone());
        };

        let mut out: Vec<T> = state.proto.iter().take(overlay.len()).cloned().collect();
        let mut cursor = 0;
        for slot in overlay {
            match slot {
                None => cursor += 1,
                Some(value) if value.is_unit() => {
                    if cursor < out.len() {
                        out.remove(cursor);
                    }
                }
                Some(value) => {
                    let item = T::from_script_at(value, depth)?;
                    if cursor < out.len() {
                        out[cursor] = item;
                    } else {
                        out.push(item);
                    }
                    cursor += 1;
                }
            }
        }
        Ok(out)
    }

    pub fn push(&self, value: Dynamic) -> Result<()> {
        let mut state = acquire(&self.0, T::LIST_NAME)?;
        state.overlay_mut().push(Some(value));
        Ok(())
    }

    pub fn pop(&self) -> Result<Dynamic> {
        let len = self.len();
        if len == 0 {
            return Ok(Dynamic::UNIT);
        }
        let last = DynamicArray::get(self, len as INT - 1)?;
        self.set_len(len - 1)?;
        Ok(last)
    }

    /// Script values of every element, materializing the cache.
    pub fn values(&self) -> Result<Vec<Dynamic>> {
        (0..self.len() as INT)
            .map(|i| DynamicArray::get(self, i))
            .collect()
    }
}

impl<T: ListItem> DynamicArray for ListHandle<T> {
    fn get(&self, index: INT) -> Result<Dynamic> {
        let mut state = acquire(&self.0, T::LIST_NAME)?;
        let len = state.len();
        let Some(index) = normalize(index, len).filter(|i| *i < len) else {
            return Ok(Dynamic::UNIT);
        };
        if let Some(Some(value)) = state.overlay.as_ref().and_then(|o| o.get(index)) {
            return Ok(value.clone());
        }
        let Some(proto) = state.proto.get(index) else {
            return Ok(Dynamic::UNIT);
        };
        let value = proto.into_script();
        state.overlay_mut()[index] = Some(value.clone());
        Ok(value)
    }

    fn set(&self, index: INT, value: Dynamic) -> Result<()> {
        let mut state = acquire(&self.0, T::LIST_NAME)?;
        let len = state.len();
        let index = normalize(index, len)
            .ok_or_else(|| Error::unexpected(format!("index {index}"), T::LIST_NAME))?;
        let overlay = state.overlay_mut();
        if index >= overlay.len() {
            overlay.resize(index + 1, Some(Dynamic::UNIT));
        }
        overlay[index] = Some(value);
        Ok(())
    }

    fn len(&self) -> usize {
        acquire(&self.0, T::LIST_NAME)
            .map(|state| state.len())
            .unwrap_or_default()
    }

    /// Growing pads with deleted slots, so elements dropped by an earlier
    /// shrink never reappear.
    fn set_len(&self, len: usize) -> Result<()> {
        let mut state = acquire(&self.0, T::LIST_NAME)?;
        state.overlay_mut().resize(len, Some(Dynamic::UNIT));
        Ok(())
    }
}

impl<T: ListItem> IntoIterator for ListHandle<T> {
    type Item = Dynamic;
    type IntoIter = std::vec::IntoIter<Dynamic>;

    fn into_iter(self) -> Self::IntoIter {
        self.values().unwrap_or_default().into_iter()
    }
}

impl<T: ListItem> IntoScript for Vec<T> {
    fn into_script(&self) -> Dynamic {
        Dynamic::from(ListHandle::new(self.clone()))
    }
}

impl<T: ListItem> FromScript for Vec<T> {
    const TYPE_NAME: &'static str = T::LIST_NAME;

    fn from_script_at(value: &Dynamic, depth: usize) -> Result<Vec<T>> {
        if let Some(handle) = value.read_lock::<ListHandle<T>>() {
            return handle.write_back(depth);
        }
        if let Some(items) = value.read_lock::<Array>() {
            let depth = descend(depth)?;
            return items
                .iter()
                .filter(|v| !v.is_unit())
                .map(|v| T::from_script_at(v, depth))
                .collect();
        }
        Err(unexpected(value, Self::TYPE_NAME))
    }
}
