//! Effect payload and the declarative rule pairing.

use super::{Hook, Live, Meta, When};
use crate::option::Opt;
use serde::{Deserialize, Serialize};

/// Effect applied to a matched Node through [`Node::with`](super::Node::with).
///
/// Unset fields leave the Node alone, explicit none clears the field, a
/// value merges (`meta`/`hook`), replaces (`kind`) or patches (`live`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Then {
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub kind: Opt<String>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub meta: Opt<Meta>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub hook: Opt<Hook>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub live: Opt<Live>,
}

impl Then {
    pub fn is_zero(&self) -> bool {
        self.kind.is_unset() && self.meta.is_unset() && self.hook.is_unset() && self.live.is_unset()
    }
}

/// A declarative `{when, then}` rule, handed to notification listeners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Case {
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub when: Opt<When>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub then: Opt<Then>,
}
