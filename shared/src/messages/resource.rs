//! Addresses of the hierarchical read API

use std::fmt;

use crate::types::{LogId, StepId, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourcePath {
    Units,
    UnitSteps(UnitId),
    UnitProperties(UnitId),
    StepLogs(StepId),
    LogContent(LogId),
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePath::Units => write!(f, "units"),
            ResourcePath::UnitSteps(id) => write!(f, "units/{id}/steps"),
            ResourcePath::UnitProperties(id) => write!(f, "units/{id}/properties"),
            ResourcePath::StepLogs(id) => write!(f, "steps/{id}/logs"),
            ResourcePath::LogContent(id) => write!(f, "logs/{id}/content"),
        }
    }
}
