//! Agent runtime orchestration.

use crate::config::AgentConfig;
use anyhow::{Context, Result};
use mqtt_pa_adapter::{ConfigFile, MqttPhysicalAdapter, MqttPhysicalAdapterConfiguration};
use mqtt_pa_core::{PhysicalActionRequest, PhysicalAssetNotification, ShadowState};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Console command printing the shadow state.
const STATE_COMMAND: &str = ":state";

/// The main agent runtime.
pub struct Agent {
    config: AgentConfig,
    configuration: MqttPhysicalAdapterConfiguration,
}

impl Agent {
    /// Create a new agent.
    ///
    /// # Errors
    ///
    /// Returns error if the adapter configuration cannot be loaded or is invalid.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let mut file = ConfigFile::load(&config.config_path).with_context(|| {
            format!(
                "Failed to load adapter configuration {}",
                config.config_path.display()
            )
        })?;
        config.apply_overrides(&mut file);

        let configuration = file
            .into_builder()
            .and_then(mqtt_pa_adapter::MqttPhysicalAdapterConfigurationBuilder::build)
            .context("Invalid adapter configuration")?;

        tracing::info!(
            adapter_id = %config.adapter_id,
            broker = %configuration.broker_connection_string(),
            properties = configuration.physical_asset_description().properties.len(),
            actions = configuration.physical_asset_description().actions.len(),
            events = configuration.physical_asset_description().events.len(),
            "Agent initialized"
        );

        Ok(Self {
            config,
            configuration,
        })
    }

    /// Run the agent's main loop.
    ///
    /// # Errors
    ///
    /// Returns error if the adapter fails to stop.
    pub async fn run(self) -> Result<()> {
        let mut shadow = ShadowState::new(self.configuration.physical_asset_description().clone());
        let (handle, mut notifications) =
            MqttPhysicalAdapter::new(self.config.adapter_id.clone(), self.configuration).start();

        let mut console = BufReader::new(tokio::io::stdin()).lines();
        let mut console_open = self.config.console;

        tracing::info!("Agent running, press Ctrl+C to stop");

        loop {
            tokio::select! {
                notification = notifications.recv() => {
                    let Some(notification) = notification else {
                        break;
                    };
                    log_notification(&notification);
                    shadow.apply(&notification);
                }

                line = console.next_line(), if console_open => {
                    match line {
                        Ok(Some(line)) if line.trim() == STATE_COMMAND => {
                            tracing::info!(bound = shadow.is_bound(), state = %shadow.snapshot(), "Shadow state");
                        }
                        Ok(Some(line)) => {
                            let Some(request) = parse_console_line(&line) else {
                                continue;
                            };
                            if let Err(err) = handle.invoke_action(&request).await {
                                tracing::warn!(error = %err, action_key = %request.key, "Action failed");
                            }
                        }
                        Ok(None) => console_open = false,
                        Err(err) => {
                            tracing::warn!(error = %err, "Console closed");
                            console_open = false;
                        }
                    }
                }

                // Handle shutdown
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        handle.stop().await.context("Failed to stop adapter")?;
        tracing::info!(state = %shadow.snapshot(), "Agent stopped");
        Ok(())
    }
}

fn log_notification(notification: &PhysicalAssetNotification) {
    match notification {
        PhysicalAssetNotification::Bound { description } => tracing::info!(
            properties = description.properties.len(),
            actions = description.actions.len(),
            events = description.events.len(),
            "Physical adapter bound"
        ),
        PhysicalAssetNotification::PropertyVariation { key, value, .. } => {
            tracing::info!(key = %key, %value, "Property variation");
        }
        PhysicalAssetNotification::EventNotification { key, body, .. } => {
            tracing::info!(key = %key, %body, "Event notification");
        }
        PhysicalAssetNotification::Unbound { reason } => {
            tracing::warn!(reason = %reason, "Physical adapter unbound");
        }
    }
}

/// Parse `<action-key> [body]`; the body is JSON when it parses, text otherwise.
fn parse_console_line(line: &str) -> Option<PhysicalActionRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (key, body) = match line.split_once(char::is_whitespace) {
        Some((key, rest)) => {
            let rest = rest.trim();
            let body = serde_json::from_str(rest).unwrap_or_else(|_| Value::String(rest.to_string()));
            (key, body)
        }
        None => (line, Value::Null),
    };
    Some(PhysicalActionRequest::new(key, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn console_lines() {
        assert!(parse_console_line("   ").is_none());

        let bare = parse_console_line("reset").unwrap();
        assert_eq!(bare.key, "reset");
        assert_eq!(bare.body, Value::Null);

        let text = parse_console_line("switch-off -now").unwrap();
        assert_eq!(text.body, json!("-now"));

        let structured = parse_console_line("set-level {\"level\": 3}").unwrap();
        assert_eq!(structured.key, "set-level");
        assert_eq!(structured.body, json!({"level": 3}));
    }
}
