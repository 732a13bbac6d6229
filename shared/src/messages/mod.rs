//! Message types for the event bus and the read API
//!
//! This module organizes the vocabulary shared with the service under test:
//! - `topic`: Topic paths and subscription patterns
//! - `event`: Events delivered to subscriptions
//! - `trigger`: Ways of initiating a unit of work
//! - `resource`: Addresses of the hierarchical read API

pub mod event;
pub mod resource;
pub mod topic;
pub mod trigger;

pub use event::{BusEvent, Payload};
pub use resource::ResourcePath;
pub use topic::{TopicPath, TopicPattern};
pub use trigger::Trigger;
