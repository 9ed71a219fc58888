//! # MQTT Physical Adapter
//!
//! Binds a digital twin to an MQTT broker.
//!
//! ## Flow
//!
//! 1. A [`MqttPhysicalAdapterConfiguration`] is assembled with the
//!    [`MqttPhysicalAdapterConfigurationBuilder`] or loaded from YAML.
//! 2. [`MqttPhysicalAdapter::start`] connects, subscribes to every incoming
//!    topic and announces the physical asset description with `Bound`.
//! 3. Received payloads are routed through the incoming topics and delivered
//!    to the host as property variations and event notifications.
//! 4. The host invokes actions through the [`AdapterHandle`]; each action is
//!    rendered and published on its outgoing topic.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod broker;
pub mod builder;
pub mod configuration;
pub mod file;
pub mod router;
pub mod runtime;

pub use builder::MqttPhysicalAdapterConfigurationBuilder;
pub use configuration::{ConfigurationError, MqttPhysicalAdapterConfiguration};
pub use file::ConfigFile;
pub use router::{RouteError, TopicRouter};
pub use runtime::{AdapterError, AdapterHandle, MqttPhysicalAdapter};
