//! Topic paths and subscription patterns

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ChangeId, UnitId};

/// Concrete topic an event is published on, e.g. `units.7.started`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPath(Vec<String>);

impl TopicPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn unit_started(id: UnitId) -> Self {
        Self::new(["units".to_string(), id.to_string(), "started".to_string()])
    }

    pub fn unit_finished(id: UnitId) -> Self {
        Self::new(["units".to_string(), id.to_string(), "finished".to_string()])
    }

    pub fn change_new(id: ChangeId) -> Self {
        Self::new(["changes".to_string(), id.to_string(), "new".to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Subscription filter over topic paths
///
/// Each segment is either a literal that must match exactly or `None`,
/// which matches any value. Patterns only match paths of the same length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPattern(Vec<Option<String>>);

impl TopicPattern {
    pub fn new(segments: Vec<Option<String>>) -> Self {
        Self(segments)
    }

    /// Any unit, `started` event
    pub fn unit_started() -> Self {
        Self(vec![Some("units".into()), None, Some("started".into())])
    }

    /// Any unit, `finished` event
    pub fn unit_finished() -> Self {
        Self(vec![Some("units".into()), None, Some("finished".into())])
    }

    /// Any change, `new` event
    pub fn change_new() -> Self {
        Self(vec![Some("changes".into()), None, Some("new".into())])
    }

    pub fn matches(&self, topic: &TopicPath) -> bool {
        self.0.len() == topic.0.len()
            && self
                .0
                .iter()
                .zip(topic.0.iter())
                .all(|(pattern, segment)| pattern.as_ref().is_none_or(|p| p == segment))
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self
            .0
            .iter()
            .map(|segment| segment.as_deref().unwrap_or("*"))
            .collect();
        write!(f, "{}", rendered.join("."))
    }
}
