//! Ways of initiating a unit of work

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::ChangeRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    /// Direct administrative invocation of a force scheduler
    Force {
        scheduler: String,
        reason: String,
        properties: BTreeMap<String, serde_json::Value>,
    },
    /// Submission of an external stimulus; only schedulers that already
    /// consume change events will react to it
    Change(ChangeRecord),
}

impl Trigger {
    pub fn force(scheduler: impl Into<String>) -> Self {
        Trigger::Force {
            scheduler: scheduler.into(),
            reason: "forced by harness".to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn change(change: ChangeRecord) -> Self {
        Trigger::Change(change)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Force { .. } => "force",
            Trigger::Change(_) => "change",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Force { scheduler, .. } => write!(f, "force({scheduler})"),
            Trigger::Change(change) => write!(f, "change({})", change.author),
        }
    }
}
