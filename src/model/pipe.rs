//! A registered unit of script logic.

use super::When;
use crate::option::Opt;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Script plus its match predicate and continuation list.
///
/// A Pipe without `when` never matches directly; it is only reachable
/// through another Pipe's `next`. A Pipe without `code` runs a stub that
/// passes the Nodes on to the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipe {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub name: Opt<String>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub when: Opt<When>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub code: Opt<String>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub next: Opt<Vec<Uuid>>,
}

impl Pipe {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            name: Opt::Unset,
            when: Opt::Unset,
            code: Opt::Unset,
            next: Opt::Unset,
        }
    }

    /// New Pipe with a random identity.
    pub fn random() -> Self {
        Self::new(Uuid::new_v4())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Opt::Some(name.into());
        self
    }

    pub fn with_when(mut self, when: When) -> Self {
        self.when = Opt::Some(when);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Opt::Some(code.into());
        self
    }

    pub fn with_next(mut self, next: impl IntoIterator<Item = Uuid>) -> Self {
        self.next = Opt::Some(next.into_iter().collect());
        self
    }

    /// Name when present, the uuid otherwise.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.get() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.uuid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        let id = Uuid::from_u128(3);
        assert_eq!(Pipe::new(id).label(), id.to_string());
        assert_eq!(Pipe::new(id).with_name("cats").label(), "cats");
    }

    #[test]
    fn test_json() {
        let pipe = Pipe::new(Uuid::from_u128(1))
            .with_name("a")
            .with_when(When::kind(["cat"]))
            .with_next([Uuid::from_u128(2)]);
        let json = serde_json::to_value(&pipe).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "uuid": "00000000-0000-0000-0000-000000000001",
                "name": "a",
                "when": {"kind": ["cat"]},
                "next": ["00000000-0000-0000-0000-000000000002"]
            })
        );
        let back: Pipe = serde_json::from_value(json).unwrap();
        assert_eq!(back, pipe);
    }
}
