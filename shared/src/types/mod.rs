//! Core records exchanged between the harness and the service under test

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a unit of work, assigned by the service when the unit starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

/// Identifier of a step inside a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u64);

/// Identifier of a log attached to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub u64);

/// Identifier of an external change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(pub u64);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_id!(UnitId, StepId, LogId, ChangeId);

/// Result code reported for finished units and steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCode {
    Success,
    Warnings,
    Failure,
    Skipped,
    Exception,
    Retry,
    Cancelled,
}

impl ResultCode {
    /// Combine two results, keeping the more severe one
    pub fn worst(self, other: ResultCode) -> ResultCode {
        if other.severity() > self.severity() { other } else { self }
    }

    fn severity(self) -> u8 {
        match self {
            ResultCode::Success => 0,
            ResultCode::Skipped => 1,
            ResultCode::Warnings => 2,
            ResultCode::Failure => 3,
            ResultCode::Exception => 4,
            ResultCode::Retry => 5,
            ResultCode::Cancelled => 6,
        }
    }

    /// Render an optional result the way status strings are shown in dumps
    pub fn describe(results: Option<ResultCode>) -> String {
        match results {
            Some(code) => code.to_string(),
            None => "not finished".to_string(),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Success => write!(f, "success"),
            ResultCode::Warnings => write!(f, "warnings"),
            ResultCode::Failure => write!(f, "failure"),
            ResultCode::Skipped => write!(f, "skipped"),
            ResultCode::Exception => write!(f, "exception"),
            ResultCode::Retry => write!(f, "retry"),
            ResultCode::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ResultCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(ResultCode::Success),
            "warnings" => Ok(ResultCode::Warnings),
            "failure" => Ok(ResultCode::Failure),
            "skipped" => Ok(ResultCode::Skipped),
            "exception" => Ok(ResultCode::Exception),
            "retry" => Ok(ResultCode::Retry),
            "cancelled" => Ok(ResultCode::Cancelled),
            _ => Err(format!("Unknown result code: {s}")),
        }
    }
}

/// Kind of log content
///
/// `Stdio` logs are line-typed: every line starts with a one-character tag
/// (`h` header, `o` stdout, `e` stderr) followed by the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogType {
    #[serde(rename = "s")]
    Stdio,
    #[serde(rename = "t")]
    Text,
    #[serde(rename = "h")]
    Html,
}

impl LogType {
    pub fn is_structured(self) -> bool {
        matches!(self, LogType::Stdio)
    }
}

/// Line tag of a structured (stdio) log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    Header,
    Stdout,
    Stderr,
}

impl LineType {
    /// Split a structured log line into its type and text
    ///
    /// Unknown tags are treated as stdout so that malformed content is still shown.
    pub fn split(line: &str) -> (LineType, &str) {
        let mut chars = line.chars();
        match chars.next() {
            Some('h') => (LineType::Header, chars.as_str()),
            Some('e') => (LineType::Stderr, chars.as_str()),
            Some('o') => (LineType::Stdout, chars.as_str()),
            Some(_) => (LineType::Stdout, chars.as_str()),
            None => (LineType::Stdout, ""),
        }
    }
}

/// Summary record of a unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub unitid: UnitId,
    pub number: u64,
    pub scheduler: String,
    pub state_string: String,
    pub results: Option<ResultCode>,
    pub started_at: DateTime<Utc>,
    pub complete_at: Option<DateTime<Utc>>,
}

impl UnitRecord {
    pub fn is_complete(&self) -> bool {
        self.complete_at.is_some()
    }
}

/// Named link published by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUrl {
    pub name: String,
    pub url: String,
}

/// Step of a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub stepid: StepId,
    pub unitid: UnitId,
    pub number: u32,
    pub name: String,
    pub state_string: String,
    pub results: Option<ResultCode>,
    pub urls: Vec<StepUrl>,
}

/// Log attached to a step (content is fetched separately)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub logid: LogId,
    pub stepid: StepId,
    pub name: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub num_lines: usize,
}

/// Content of a log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContent {
    pub logid: LogId,
    pub firstline: usize,
    pub content: String,
}

/// Value of a unit property together with the component that set it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub value: serde_json::Value,
    pub source: String,
}

impl PropertyValue {
    pub fn new(value: impl Into<serde_json::Value>, source: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: source.into(),
        }
    }
}

/// Properties of a unit, ordered by name
pub type Properties = BTreeMap<String, PropertyValue>;

/// External stimulus submitted to the service (e.g. a new commit)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub changeid: Option<ChangeId>,
    pub author: String,
    pub branch: Option<String>,
    pub revision: Option<String>,
    pub repository: String,
    pub project: String,
    pub comments: String,
    pub files: Vec<String>,
}

impl ChangeRecord {
    pub fn new(author: impl Into<String>, comments: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            comments: comments.into(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }
}
