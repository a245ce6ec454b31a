//! Tri-state optional field.
//!
//! Every optional field of the data model distinguishes three states:
//!
//! - [`Opt::Unset`] - the field was not mentioned. Wildcard in predicates,
//!   "no instruction" in effects, omitted from JSON.
//! - [`Opt::None`] - the field is present but deliberately empty. "Must be
//!   absent" in predicates, "clear" in effects, `null` in JSON.
//! - [`Opt::Some`] - the field carries a value.
//!
//! Serde support relies on the field being annotated with
//! `#[serde(default, skip_serializing_if = "Opt::is_unset")]`: a missing key
//! deserializes as `Unset`, an explicit `null` as `None`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Three-valued field wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Opt<T> {
    #[default]
    Unset,
    None,
    Some(T),
}

impl<T> Opt<T> {
    /// True when the field was never mentioned.
    pub fn is_unset(&self) -> bool {
        matches!(self, Opt::Unset)
    }

    /// True when the field is explicitly absent.
    pub fn is_none(&self) -> bool {
        matches!(self, Opt::None)
    }

    pub fn is_some(&self) -> bool {
        matches!(self, Opt::Some(_))
    }

    /// Present value, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Opt::Some(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Opt::Some(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Opt<&T> {
        match self {
            Opt::Unset => Opt::Unset,
            Opt::None => Opt::None,
            Opt::Some(v) => Opt::Some(v),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Opt<U> {
        match self {
            Opt::Unset => Opt::Unset,
            Opt::None => Opt::None,
            Opt::Some(v) => Opt::Some(f(v)),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Opt::Some(v) => Some(v),
            _ => None,
        }
    }

    /// Takes the value out, leaving `Unset` behind.
    pub fn take(&mut self) -> Opt<T> {
        std::mem::take(self)
    }
}

impl<T: Default> Opt<T> {
    /// Present value or the type's zero value.
    pub fn get_or_zero(&self) -> T
    where
        T: Clone,
    {
        self.get().cloned().unwrap_or_default()
    }
}

impl<T> From<Option<T>> for Opt<T> {
    /// `Some` stays `Some`, `None` becomes explicit `None`.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Opt::Some(v),
            None => Opt::None,
        }
    }
}

impl<T: Serialize> Serialize for Opt<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Opt::Some(v) => v.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Opt<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Opt::from)
    }
}
