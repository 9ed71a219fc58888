//! # MQTT Physical Adapter Topics
//!
//! MQTT topic model used to bind a digital twin to a broker.
//!
//! ## Directions
//!
//! - **Incoming** topics are subscribed to; each received payload is turned
//!   into property variations or event notifications.
//! - **Outgoing** topics are published to when the twin requests an action.
//!
//! Incoming topics may be filters (`sensors/+/temperature`, `plant/#`);
//! outgoing topics are always concrete topic names.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod incoming;
pub mod outgoing;
pub mod topic;

pub use incoming::{DigitalTwinIncomingTopic, SubscribeFunction};
pub use outgoing::{DigitalTwinOutgoingTopic, PublishFunction};
pub use topic::{
    topic_matches, validate_topic_filter, validate_topic_name, MqttTopic, QosLevel, TopicError,
};
