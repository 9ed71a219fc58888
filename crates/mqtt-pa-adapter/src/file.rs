//! YAML configuration files.
//!
//! ```yaml
//! brokerAddress: 127.0.0.1
//! brokerPort: 1883
//! clientId: lamp-adapter          # optional
//! username: user                  # optional, sent only with a password
//! password: secret
//! cleanSession: true              # optional
//! connectionTimeout: 10           # seconds, optional
//! automaticReconnect: true        # optional
//! reconnectDelay: 5               # seconds, optional
//! keepAlive: 30                   # seconds, optional
//! paProperties:
//!   - propertyKey: intensity
//!     topic: sensor/intensity
//!     type: int
//!     initialValue: 0
//!   - propertyKey: samples
//!     topic: sensor/samples
//!     type: json-array
//!     field-type: double
//!     initialValue: []
//! paActions:
//!   - actionKey: switch-off
//!     type: sensor.actuation
//!     contentType: text/plain
//!     topic: sensor/actions/switch
//!     action: switch
//! paEvents:
//!   - eventKey: overheating
//!     type: text/plain
//!     topic: sensor/overheating
//! ```

use crate::builder::MqttPhysicalAdapterConfigurationBuilder;
use crate::configuration::ConfigurationError;
use figment::providers::{Format, Yaml};
use figment::Figment;
use mqtt_pa_core::{PhysicalAssetEvent, PhysicalAssetProperty, ValueType};
use mqtt_pa_topics::{DigitalTwinIncomingTopic, DigitalTwinOutgoingTopic, QosLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Broker host
    pub broker_address: String,
    /// Broker port
    pub broker_port: u16,
    /// Client identifier; generated when absent
    pub client_id: Option<String>,
    /// Username
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Clean session flag
    pub clean_session: Option<bool>,
    /// Connection timeout in seconds
    pub connection_timeout: Option<u64>,
    /// Reconnect after failures
    pub automatic_reconnect: Option<bool>,
    /// Pause between reconnection attempts in seconds
    pub reconnect_delay: Option<u64>,
    /// Keep-alive interval in seconds
    pub keep_alive: Option<u64>,
    /// Properties and the topics feeding them
    #[serde(default)]
    pub pa_properties: Vec<PropertyEntry>,
    /// Actions and the topics they publish to
    #[serde(default)]
    pub pa_actions: Vec<ActionEntry>,
    /// Events and the topics feeding them
    #[serde(default)]
    pub pa_events: Vec<EventEntry>,
}

/// A `paProperties` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyEntry {
    /// Property key
    pub property_key: String,
    /// Topic (or filter) carrying the property
    pub topic: String,
    /// Value type name
    #[serde(rename = "type")]
    pub value_type: String,
    /// Initial value; the type's zero value when absent
    #[serde(default)]
    pub initial_value: Value,
    /// Element type for `json-array`
    #[serde(rename = "field-type", default)]
    pub field_type: Option<String>,
    /// Subscription QoS
    #[serde(default)]
    pub qos: QosLevel,
}

/// A `paActions` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    /// Action key
    pub action_key: String,
    /// Action type
    #[serde(rename = "type")]
    pub action_type: String,
    /// Content type of the action body
    pub content_type: String,
    /// Topic to publish to
    pub topic: String,
    /// Word prepended to the body in the published payload
    #[serde(default)]
    pub action: String,
    /// Publication QoS
    #[serde(default)]
    pub qos: QosLevel,
    /// Retain flag
    #[serde(default)]
    pub retain: bool,
}

/// A `paEvents` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    /// Event key
    pub event_key: String,
    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,
    /// Topic (or filter) carrying the event
    pub topic: String,
    /// Subscription QoS
    #[serde(default)]
    pub qos: QosLevel,
}

impl ConfigFile {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.is_file() {
            return Err(ConfigurationError::FileNotFound(path.to_path_buf()));
        }
        tracing::debug!(path = %path.display(), "Loading adapter configuration");
        Ok(Figment::new().merge(Yaml::file(path)).extract()?)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        Ok(Figment::new().merge(Yaml::string(yaml)).extract()?)
    }

    /// Turn the file into a populated builder.
    ///
    /// # Errors
    ///
    /// Returns error if a setting, topic or initial value is invalid.
    pub fn into_builder(self) -> Result<MqttPhysicalAdapterConfigurationBuilder, ConfigurationError> {
        let mut builder = match self.client_id {
            Some(client_id) => MqttPhysicalAdapterConfigurationBuilder::with_client_id(
                self.broker_address,
                self.broker_port,
                client_id,
            )?,
            None => MqttPhysicalAdapterConfigurationBuilder::new(
                self.broker_address,
                self.broker_port,
            )?,
        };

        if let (Some(username), Some(password)) = (self.username, self.password) {
            builder = builder.credentials(username, password);
        }
        if let Some(clean_session) = self.clean_session {
            builder = builder.clean_session(clean_session);
        }
        if let Some(automatic_reconnect) = self.automatic_reconnect {
            builder = builder.automatic_reconnect(automatic_reconnect);
        }
        if let Some(secs) = self.connection_timeout {
            builder = builder.connection_timeout(Duration::from_secs(secs))?;
        }
        if let Some(secs) = self.reconnect_delay {
            builder = builder.reconnect_delay(Duration::from_secs(secs))?;
        }
        if let Some(secs) = self.keep_alive {
            builder = builder.keep_alive(Duration::from_secs(secs))?;
        }

        for entry in self.pa_properties {
            builder = add_property(builder, entry)?;
        }
        for entry in self.pa_actions {
            let topic = DigitalTwinOutgoingTopic::prefixed(entry.topic, entry.action)
                .with_qos(entry.qos)
                .with_retain(entry.retain);
            builder = builder.add_outgoing_topic(
                entry.action_key,
                entry.action_type,
                entry.content_type,
                topic,
            )?;
        }
        for entry in self.pa_events {
            let topic =
                DigitalTwinIncomingTopic::event(entry.topic, entry.event_key.clone()).with_qos(entry.qos);
            builder = builder.add_incoming_topic(
                topic,
                Vec::new(),
                vec![PhysicalAssetEvent::new(entry.event_key, entry.event_type)],
            )?;
        }

        Ok(builder)
    }
}

fn add_property(
    builder: MqttPhysicalAdapterConfigurationBuilder,
    entry: PropertyEntry,
) -> Result<MqttPhysicalAdapterConfigurationBuilder, ConfigurationError> {
    let key = entry.property_key;
    let property_error = |source| ConfigurationError::Property {
        key: key.clone(),
        source,
    };

    let value_type = ValueType::from_name(&entry.value_type, entry.field_type.as_deref())
        .map_err(property_error)?;
    let initial_value = if entry.initial_value.is_null() {
        value_type.default_value()
    } else {
        value_type
            .coerce(&entry.initial_value)
            .map_err(property_error)?
    };

    let topic =
        DigitalTwinIncomingTopic::property(entry.topic, key.clone(), value_type).with_qos(entry.qos);
    builder.add_incoming_topic(
        topic,
        vec![PhysicalAssetProperty::new(key, initial_value)],
        Vec::new(),
    )
}
