//! Events delivered through the bus

use serde::{Deserialize, Serialize};

use super::topic::TopicPath;
use crate::types::{ChangeRecord, UnitRecord};

/// Payload carried by an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "lowercase")]
pub enum Payload {
    Unit(UnitRecord),
    Change(ChangeRecord),
}

/// Immutable event as delivered to a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub topic: TopicPath,
    pub payload: Payload,
}

impl BusEvent {
    pub fn new(topic: TopicPath, payload: Payload) -> Self {
        Self { topic, payload }
    }

    pub fn unit(&self) -> Option<&UnitRecord> {
        match &self.payload {
            Payload::Unit(unit) => Some(unit),
            Payload::Change(_) => None,
        }
    }

    pub fn into_unit(self) -> Option<UnitRecord> {
        match self.payload {
            Payload::Unit(unit) => Some(unit),
            Payload::Change(_) => None,
        }
    }

    pub fn change(&self) -> Option<&ChangeRecord> {
        match &self.payload {
            Payload::Change(change) => Some(change),
            Payload::Unit(_) => None,
        }
    }
}
