//! Match predicate selecting the Nodes a Pipe runs on.

use super::{Hook, Live};
use crate::option::Opt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Predicate over a Node. Set fields combine with AND; list-valued fields
/// are OR over their patterns. Unset fields impose no constraint, explicit
/// none requires the Node's field to be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct When {
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub uuid: Opt<BTreeSet<Uuid>>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub kind: Opt<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub hook: Opt<Vec<Hook>>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub live: Opt<Vec<Live>>,
}

impl When {
    /// Catch-all predicate.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn uuid(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            uuid: Opt::Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn kind<S: Into<String>>(kinds: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind: Opt::Some(kinds.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn hook(patterns: impl IntoIterator<Item = Hook>) -> Self {
        Self {
            hook: Opt::Some(patterns.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn live(windows: impl IntoIterator<Item = Live>) -> Self {
        Self {
            live: Opt::Some(windows.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.uuid.is_unset() && self.kind.is_unset() && self.hook.is_unset() && self.live.is_unset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert!(When::any().is_zero());
        assert!(!When::kind(["cat"]).is_zero());
        let none = When {
            hook: Opt::None,
            ..When::default()
        };
        assert!(!none.is_zero());
    }

    #[test]
    fn test_json_shape() {
        let id = Uuid::from_u128(1);
        let when = When {
            uuid: Opt::Some(BTreeSet::from([id])),
            live: Opt::None,
            ..When::default()
        };
        let json = serde_json::to_value(&when).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"uuid": ["00000000-0000-0000-0000-000000000001"], "live": null})
        );
        let back: When = serde_json::from_value(json).unwrap();
        assert_eq!(back, when);
    }
}
