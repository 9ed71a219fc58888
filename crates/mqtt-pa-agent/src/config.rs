//! Agent configuration.

use anyhow::{Context, Result};
use mqtt_pa_adapter::broker::parse_mqtt_url;
use mqtt_pa_adapter::ConfigFile;
use std::path::PathBuf;
use uuid::Uuid;

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Adapter identifier
    pub adapter_id: String,

    /// Adapter YAML configuration file
    pub config_path: PathBuf,

    /// Broker override as `(host, port)`
    pub broker: Option<(String, u16)>,

    /// Username override
    pub username: Option<String>,

    /// Password override
    pub password: Option<String>,

    /// Read action requests from stdin
    pub console: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            adapter_id: format!("mqtt-pa-{}", Uuid::new_v4()),
            config_path: PathBuf::from("./mqtt-pa.yaml"),
            broker: None,
            username: None,
            password: None,
            console: true,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MQTT_PA_CONFIG`: adapter YAML file
    /// - `MQTT_PA_ADAPTER_ID`: adapter identifier
    /// - `MQTT_PA_BROKER`: broker URL overriding the file
    /// - `MQTT_PA_USERNAME` / `MQTT_PA_PASSWORD`: credentials overriding the file
    /// - `MQTT_PA_CONSOLE`: set to `0` to ignore stdin
    ///
    /// # Errors
    ///
    /// Returns error if `MQTT_PA_BROKER` is not a valid broker URL.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("MQTT_PA_CONFIG") {
            config.config_path = PathBuf::from(path);
        }

        if let Ok(id) = std::env::var("MQTT_PA_ADAPTER_ID") {
            config.adapter_id = id;
        }

        if let Ok(broker) = std::env::var("MQTT_PA_BROKER") {
            config.broker = Some(parse_mqtt_url(&broker).context("Invalid MQTT_PA_BROKER")?);
        }

        if let Ok(username) = std::env::var("MQTT_PA_USERNAME") {
            config.username = Some(username);
        }

        if let Ok(password) = std::env::var("MQTT_PA_PASSWORD") {
            config.password = Some(password);
        }

        if let Ok(console) = std::env::var("MQTT_PA_CONSOLE") {
            config.console = console != "0";
        }

        Ok(config)
    }

    /// Apply the overrides to a loaded configuration file.
    pub fn apply_overrides(&self, file: &mut ConfigFile) {
        if let Some((host, port)) = &self.broker {
            file.broker_address.clone_from(host);
            file.broker_port = *port;
        }
        if let Some(username) = &self.username {
            file.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            file.password = Some(password.clone());
        }
    }
}
