//! Integration layer for a business-process engine: consolidates the
//! engine's fine-grained lifecycle events into deduplicated per-instance
//! and per-task state snapshots for downstream consumers, and routes
//! inbound messages back into running (or new) process instances via
//! correlation.
//!
//! Outbound: engine → [`EventCollector`] → [`EventManager::publish`] →
//! registered [`EventPublisher`] sinks. Inbound: message →
//! [`CorrelationDispatcher`] → [`ProcessService`].

pub mod collector;
pub mod correlation;
pub mod dispatch;
pub mod events;
pub mod instance;
pub mod manager;
pub mod snapshot;
pub mod types;

pub use collector::{CollectorConfig, EventBatch, EventCollector};
pub use correlation::{
    AttributeResolver, CorrelationResolver, CorrelationValue, Message, PayloadResolver,
    ReferenceIdResolver,
};
pub use dispatch::{
    CorrelationDispatcher, InstanceRef, ModelConverter, ProcessService, ServiceError,
};
pub use events::{RawLifecycleEvent, StateEvent, StateEventBody};
pub use instance::{InstanceView, NodeInstance, WorkItem};
pub use manager::{EventManager, EventPublisher};
pub use snapshot::{NodeSnapshot, ProcessSnapshot, TaskSnapshot};
pub use types::{InstanceError, ProcessStateCode};
