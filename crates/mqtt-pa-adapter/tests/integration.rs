use mqtt_pa_adapter::broker::parse_mqtt_url;
use mqtt_pa_adapter::{MqttPhysicalAdapter, MqttPhysicalAdapterConfiguration};
use mqtt_pa_core::{PhysicalActionRequest, PhysicalAssetNotification, ValueType};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use uuid::Uuid;

fn broker() -> Option<(String, u16)> {
    if std::env::var("MQTT_PA_INTEGRATION").is_err() {
        eprintln!("Skipping integration test; set MQTT_PA_INTEGRATION=1 to run");
        return None;
    }
    let url =
        std::env::var("MQTT_PA_BROKER").unwrap_or_else(|_| "tcp://localhost:1883".to_string());
    Some(parse_mqtt_url(&url).expect("invalid MQTT_PA_BROKER"))
}

async fn next_matching<F>(
    rx: &mut mpsc::Receiver<PhysicalAssetNotification>,
    predicate: F,
) -> PhysicalAssetNotification
where
    F: Fn(&PhysicalAssetNotification) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let notification = rx.recv().await.expect("adapter channel closed");
            if predicate(&notification) {
                return notification;
            }
        }
    })
    .await
    .expect("timeout waiting for notification")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn property_and_action_roundtrip() {
    let Some((host, port)) = broker() else {
        return;
    };

    let prefix = format!("mqtt-pa-it/{}", Uuid::new_v4().simple());
    let intensity_topic = format!("{prefix}/intensity");
    let switch_topic = format!("{prefix}/actions/switch");

    let configuration = MqttPhysicalAdapterConfiguration::builder(host.clone(), port)
        .unwrap()
        .add_property_and_topic(
            "intensity",
            serde_json::json!(0),
            intensity_topic.clone(),
            ValueType::Int,
        )
        .unwrap()
        .add_action_and_topic(
            "switch-off",
            "sensor.actuation",
            "text/plain",
            switch_topic.clone(),
            |body| format!("switch{}", mqtt_pa_core::value::text_of(body)),
        )
        .unwrap()
        .build()
        .unwrap();

    let (handle, mut rx) = MqttPhysicalAdapter::new("it-adapter", configuration).start();
    next_matching(&mut rx, |n| {
        matches!(n, PhysicalAssetNotification::Bound { .. })
    })
    .await;

    // Simulated device: observes actions and publishes telemetry.
    let mut device_opts = MqttOptions::new(format!("device-{}", Uuid::new_v4()), host, port);
    device_opts.set_keep_alive(Duration::from_secs(5));
    let (device, mut device_eventloop) = AsyncClient::new(device_opts, 10);
    device
        .subscribe(&switch_topic, QoS::AtLeastOnce)
        .await
        .unwrap();

    let (action_tx, action_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut action_tx = Some(action_tx);
        loop {
            match device_eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(tx) = action_tx.take() {
                        let _ = tx.send(publish.payload.to_vec());
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;

    device
        .publish(&intensity_topic, QoS::AtLeastOnce, false, "42")
        .await
        .unwrap();

    let variation = next_matching(&mut rx, |n| n.key() == Some("intensity")).await;
    assert!(matches!(
        variation,
        PhysicalAssetNotification::PropertyVariation { value, .. } if value == serde_json::json!(42)
    ));

    handle
        .invoke_action(&PhysicalActionRequest::new(
            "switch-off",
            serde_json::json!("-off"),
        ))
        .await
        .unwrap();

    let payload = timeout(Duration::from_secs(5), action_rx)
        .await
        .expect("timeout waiting for action")
        .expect("device dropped");
    assert_eq!(payload, b"switch-off");

    handle.stop().await.unwrap();
}
