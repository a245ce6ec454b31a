//! Validity window of a Node.

use crate::option::Opt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{since, until}` window; the zero value has both bounds unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Live {
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub since: Opt<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Opt::is_unset")]
    pub until: Opt<DateTime<Utc>>,
}

impl Live {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Opt::Some(since),
            until: Opt::Some(until),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.since.is_unset() && self.until.is_unset()
    }

    /// Applies `patch`, keeping bounds the patch leaves unset.
    pub fn with(mut self, patch: Live) -> Live {
        if !patch.since.is_unset() {
            self.since = patch.since;
        }
        if !patch.until.is_unset() {
            self.until = patch.until;
        }
        self
    }

    /// True when this window covers the bounds of `pattern`: our `since`
    /// is not after the pattern's and our `until` is not before it. A
    /// bound missing on either side does not constrain.
    pub fn covers(&self, pattern: &Live) -> bool {
        if let (Some(own), Some(bound)) = (self.since.get(), pattern.since.get()) {
            if own > bound {
                return false;
            }
        }
        if let (Some(own), Some(bound)) = (self.until.get(), pattern.until.get()) {
            if own < bound {
                return false;
            }
        }
        true
    }
}
