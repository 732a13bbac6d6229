//! Shared types for the orchestration test harness
//!
//! Contains the records, topics and service contract that both the harness
//! and the in-process sandbox service agree on. Component-internal types are
//! kept in their respective crates.

pub mod bus;
pub mod errors;
pub mod logging;
pub mod messages;
pub mod traits;
pub mod types;

pub use bus::{Subscription, SubscriptionId, Unsubscribe};
pub use errors::*;
pub use types::*;

// Re-export the event bus vocabulary
pub use messages::{
    // Topic routing
    TopicPath, TopicPattern,

    // Events delivered to subscriptions
    BusEvent, Payload,

    // Work initiation
    Trigger,

    // Read API addressing
    ResourcePath,
};

pub use traits::{
    DataApi, EventBus, ListenerProbe, ServiceLifecycle, ServiceUnderTest, TriggerControl,
};
