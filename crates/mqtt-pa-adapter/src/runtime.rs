//! Adapter runtime driving the MQTT connection.

use crate::configuration::MqttPhysicalAdapterConfiguration;
use crate::router::{RouteError, TopicRouter};
use mqtt_pa_core::{PhysicalActionRequest, PhysicalAssetNotification};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Outgoing, Packet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How long a stopping adapter waits for the DISCONNECT to leave.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// An MQTT physical adapter, ready to be started.
#[derive(Debug)]
pub struct MqttPhysicalAdapter {
    id: String,
    configuration: Arc<MqttPhysicalAdapterConfiguration>,
}

impl MqttPhysicalAdapter {
    /// Create an adapter.
    #[must_use]
    pub fn new(id: impl Into<String>, configuration: MqttPhysicalAdapterConfiguration) -> Self {
        Self {
            id: id.into(),
            configuration: Arc::new(configuration),
        }
    }

    /// Adapter identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adapter configuration.
    #[must_use]
    pub fn configuration(&self) -> &MqttPhysicalAdapterConfiguration {
        &self.configuration
    }

    /// Connect to the broker and start forwarding notifications.
    ///
    /// Returns a handle for invoking actions and stopping the adapter, and the
    /// channel on which the host receives notifications. The first message on
    /// the channel is `Bound` once the broker accepts the connection; the last
    /// one is `Unbound`. Dropping the handle stops the adapter.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(self) -> (AdapterHandle, mpsc::Receiver<PhysicalAssetNotification>) {
        let capacity = self.configuration.request_capacity();
        let (client, mut eventloop) =
            AsyncClient::new(self.configuration.mqtt_options(), capacity);
        eventloop.network_options = self.configuration.network_options();

        // One extra slot stays reserved for the final `Unbound`.
        let (tx, rx) = mpsc::channel(capacity.saturating_add(1));
        let unbound = tx.clone().try_reserve_owned().ok();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            adapter_id = %self.id,
            broker = %self.configuration.broker_connection_string(),
            client_id = %self.configuration.client_id(),
            "Starting MQTT physical adapter"
        );

        let task = EventLoopTask {
            adapter_id: self.id.clone(),
            configuration: Arc::clone(&self.configuration),
            router: TopicRouter::from_configuration(&self.configuration),
            client: client.clone(),
            eventloop,
            tx,
            unbound,
            shutdown: shutdown_rx,
            connected: false,
            bound: false,
            backoff: None,
        };
        let join = tokio::spawn(task.run());

        let handle = AdapterHandle {
            id: self.id,
            client,
            configuration: self.configuration,
            shutdown: shutdown_tx,
            task: Some(join),
        };
        (handle, rx)
    }
}

/// Host-side handle of a running adapter.
#[derive(Debug)]
pub struct AdapterHandle {
    id: String,
    client: AsyncClient,
    configuration: Arc<MqttPhysicalAdapterConfiguration>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl AdapterHandle {
    /// Adapter identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Publish an action request on its outgoing topic.
    ///
    /// # Errors
    ///
    /// Returns error if no outgoing topic is bound to the action, or the
    /// client can no longer accept requests.
    pub async fn invoke_action(&self, request: &PhysicalActionRequest) -> Result<(), AdapterError> {
        let (topic, payload) = render_action(&self.configuration, request)?;

        tracing::debug!(
            adapter_id = %self.id,
            action_key = %request.key,
            topic = %topic.topic(),
            payload_len = payload.len(),
            "Publishing action"
        );

        self.client
            .publish(topic.topic(), topic.qos().into(), topic.retain(), payload)
            .await
            .map_err(|e| AdapterError::Publish(e.to_string()))
    }

    /// Disconnect and wait for the event loop to finish.
    ///
    /// Completes even when the host has stopped draining notifications.
    ///
    /// # Errors
    ///
    /// Returns error if the event loop task panicked.
    pub async fn stop(mut self) -> Result<(), AdapterError> {
        tracing::info!(adapter_id = %self.id, "Stopping MQTT physical adapter");
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| AdapterError::Task(e.to_string()))?;
        }
        Ok(())
    }
}

/// Resolve the outgoing topic of an action and render its payload.
///
/// # Errors
///
/// Returns error if no outgoing topic is bound to the action.
pub fn render_action<'a>(
    configuration: &'a MqttPhysicalAdapterConfiguration,
    request: &PhysicalActionRequest,
) -> Result<(&'a mqtt_pa_topics::DigitalTwinOutgoingTopic, String), AdapterError> {
    let topic = configuration
        .outgoing_topic_for_action(&request.key)
        .ok_or_else(|| AdapterError::UnknownAction(request.key.clone()))?;
    Ok((topic, topic.apply(&request.body)))
}

/// Resolves once a stop is requested or the handle is dropped.
async fn stop_requested(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

struct EventLoopTask {
    adapter_id: String,
    configuration: Arc<MqttPhysicalAdapterConfiguration>,
    router: TopicRouter,
    client: AsyncClient,
    eventloop: EventLoop,
    tx: mpsc::Sender<PhysicalAssetNotification>,
    unbound: Option<mpsc::OwnedPermit<PhysicalAssetNotification>>,
    shutdown: watch::Receiver<bool>,
    connected: bool,
    bound: bool,
    backoff: Option<Duration>,
}

/// What one turn of the event loop produced.
enum Polled {
    Event(Result<Event, ConnectionError>),
    ConnectTimeout,
}

/// How the event loop continues after handling something.
enum Flow {
    Continue,
    /// The task ends without further messages
    Exit,
    /// A stop was requested: disconnect, then send `Unbound`
    Shutdown,
}

impl EventLoopTask {
    async fn run(mut self) {
        loop {
            let shutdown = self.shutdown.clone();
            let flow = tokio::select! {
                () = stop_requested(shutdown) => Flow::Shutdown,
                polled = self.next_event() => self.handle_polled(polled).await,
            };

            match flow {
                Flow::Continue => {}
                Flow::Exit => break,
                Flow::Shutdown => {
                    self.shutdown().await;
                    break;
                }
            }
        }

        tracing::info!(adapter_id = %self.adapter_id, "MQTT physical adapter stopped");
    }

    /// Wait out any pending backoff, then poll the event loop. Until the
    /// broker acknowledges a connection, the poll is bounded by the
    /// connection timeout.
    async fn next_event(&mut self) -> Polled {
        if let Some(delay) = self.backoff.take() {
            tokio::time::sleep(delay).await;
        }
        if self.connected {
            return Polled::Event(self.eventloop.poll().await);
        }
        match tokio::time::timeout(self.configuration.connection_timeout(), self.eventloop.poll())
            .await
        {
            Ok(event) => Polled::Event(event),
            Err(_) => Polled::ConnectTimeout,
        }
    }

    async fn handle_polled(&mut self, polled: Polled) -> Flow {
        match polled {
            Polled::Event(Ok(event)) => self.handle_event(event).await,
            Polled::Event(Err(err)) => self.handle_error(&err.to_string()),
            Polled::ConnectTimeout => {
                let timeout = self.configuration.connection_timeout();
                self.handle_error(&format!("connection timed out after {timeout:?}"))
            }
        }
    }

    async fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                self.connected = true;
                tracing::info!(
                    adapter_id = %self.adapter_id,
                    session_present = ack.session_present,
                    "Connected to MQTT broker"
                );
                self.subscribe();
                if self.bound {
                    return Flow::Continue;
                }
                self.bound = true;
                let description = self.configuration.physical_asset_description().clone();
                self.forward(PhysicalAssetNotification::Bound { description })
                    .await
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let payload_len = publish.payload.len();
                tracing::debug!(topic = %publish.topic, payload_len, "Received MQTT message");

                match self.router.route(&publish.topic, &publish.payload) {
                    Ok(notifications) => {
                        for notification in notifications {
                            let flow = self.forward(notification).await;
                            if !matches!(flow, Flow::Continue) {
                                return flow;
                            }
                        }
                    }
                    Err(RouteError::Unrouted(topic)) => {
                        tracing::debug!(topic = %topic, "Dropping message on unrouted topic");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, payload_len, "Failed to convert MQTT message");
                    }
                }
                Flow::Continue
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                tracing::debug!(pkid = ack.pkid, "Subscription acknowledged");
                Flow::Continue
            }
            Event::Outgoing(Outgoing::Disconnect) => {
                self.connected = false;
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    fn handle_error(&mut self, reason: &str) -> Flow {
        self.connected = false;
        if self.configuration.automatic_reconnect() {
            let delay = self.configuration.reconnect_delay();
            tracing::error!(
                adapter_id = %self.adapter_id,
                error = reason,
                retry_in = ?delay,
                "MQTT connection error"
            );
            self.backoff = Some(delay);
            return Flow::Continue;
        }

        tracing::error!(
            adapter_id = %self.adapter_id,
            error = reason,
            "MQTT connection error, automatic reconnect disabled"
        );
        self.unbind(reason);
        Flow::Exit
    }

    fn subscribe(&self) {
        if self.router.is_empty() {
            return;
        }
        let filters = self.router.subscriptions();
        for filter in &filters {
            tracing::info!(topic = %filter.path, qos = ?filter.qos, "Subscribing to incoming topic");
        }
        if let Err(err) = self.client.try_subscribe_many(filters) {
            tracing::error!(error = %err, "Failed to queue subscriptions");
        }
    }

    /// Wait for room on the host channel, giving way to a stop request.
    async fn forward(&mut self, notification: PhysicalAssetNotification) -> Flow {
        let shutdown = self.shutdown.clone();
        tokio::select! {
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(notification);
                    Flow::Continue
                }
                Err(_) => {
                    tracing::warn!(adapter_id = %self.adapter_id, "Notification receiver dropped, stopping adapter");
                    Flow::Exit
                }
            },
            () = stop_requested(shutdown) => Flow::Shutdown,
        }
    }

    /// Send `Unbound` on the reserved slot; it is always the last message.
    fn unbind(&mut self, reason: &str) {
        if let Some(permit) = self.unbound.take() {
            permit.send(PhysicalAssetNotification::Unbound {
                reason: reason.to_string(),
            });
        }
    }

    async fn shutdown(&mut self) {
        if self.connected && self.client.try_disconnect().is_ok() {
            let drain = async {
                loop {
                    match self.eventloop.poll().await {
                        Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            };
            if tokio::time::timeout(DISCONNECT_GRACE, drain).await.is_err() {
                tracing::warn!(adapter_id = %self.adapter_id, "Timed out sending DISCONNECT");
            }
        }
        self.connected = false;
        self.unbind("stopped");
    }
}

/// Errors from a running adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// No outgoing topic is bound to the action
    #[error("no outgoing topic for action '{0}'")]
    UnknownAction(String),
    /// The client rejected a publish request
    #[error("publish error: {0}")]
    Publish(String),
    /// The event loop task failed
    #[error("event loop task failed: {0}")]
    Task(String),
}
