//! MQTT broker client behind [`MessageTransport`]
//!
//! The rumqttc event loop runs as a task on the shared tokio runtime and
//! files every incoming publish into a [`Mailbox`]. Commands stay
//! synchronous: publishing only queues a request, and subscribing blocks
//! on the mailbox until a message newer than the subscription arrives.

use crate::core::config::MqttConfig;
use crate::services::transport::{check_publish_topic, Mailbox, MessageTransport, QoS, TransportError};
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Outgoing requests buffered before `try_*` calls start failing
const REQUEST_CAPACITY: usize = 32;

/// Pause after a connection error before polling again
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Connection options for the configured broker
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), config.broker_host.clone(), config.broker_port);
    // rumqttc rejects keep-alive intervals under one second
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(1)));
    options.set_clean_session(config.clean_session);
    if let Some(username) = &config.username {
        options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
    }
    options
}

/// Network MQTT client
pub struct MqttTransport {
    client: AsyncClient,
    mailbox: Arc<Mailbox>,
}

impl MqttTransport {
    /// Start the client; the connection is made in the background
    pub fn connect(config: &MqttConfig, runtime: &Runtime) -> Self {
        let (client, event_loop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
        let mailbox = Arc::new(Mailbox::default());

        tracing::info!(
            "Connecting to MQTT broker {}:{} as {}",
            config.broker_host,
            config.broker_port,
            config.client_id
        );
        runtime.spawn(poll_events(event_loop, Arc::clone(&mailbox)));

        Self { client, mailbox }
    }
}

async fn poll_events(mut event_loop: EventLoop, mailbox: Arc<Mailbox>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = String::from_utf8_lossy(&publish.payload);
                tracing::debug!("Received {} bytes on {}", publish.payload.len(), publish.topic);
                if mailbox.deliver(&publish.topic, &payload).is_err() {
                    tracing::error!("Mailbox closed, stopping MQTT event loop");
                    return;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => tracing::info!("Connected to MQTT broker"),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

fn rejected(topic: &str, error: ClientError) -> TransportError {
    TransportError::Rejected {
        topic: topic.to_string(),
        reason: error.to_string(),
    }
}

impl MessageTransport for MqttTransport {
    fn publish(&self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<(), TransportError> {
        check_publish_topic(topic)?;
        self.client
            .try_publish(topic, qos.into(), retain, payload.as_bytes().to_vec())
            .map_err(|e| rejected(topic, e))?;

        tracing::debug!("Queued {} bytes for {} ({:?}, retain={})", payload.len(), topic, qos, retain);
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS, timeout: Duration) -> Result<String, TransportError> {
        let seen = self.mailbox.mark(topic)?;
        self.client
            .try_subscribe(topic, qos.into())
            .map_err(|e| rejected(topic, e))?;

        // Retained messages arrive as ordinary publishes after the subscribe
        let message = self.mailbox.wait_after(topic, seen, timeout);

        if let Err(e) = self.client.try_unsubscribe(topic) {
            tracing::warn!("Failed to unsubscribe from {}: {}", topic, e);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_maps_to_client_levels() {
        assert_eq!(rumqttc::QoS::from(QoS::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(rumqttc::QoS::from(QoS::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(rumqttc::QoS::from(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[test]
    fn test_options_follow_config() {
        let config = MqttConfig {
            broker_host: "10.0.0.5".into(),
            broker_port: 8883,
            client_id: "kitchen".into(),
            keep_alive_secs: 30,
            clean_session: false,
            username: Some("azazel".into()),
            password: Some("secret".into()),
            ..MqttConfig::default()
        };

        let options = mqtt_options(&config);
        assert_eq!(options.broker_address(), ("10.0.0.5".to_string(), 8883));
        assert_eq!(options.client_id(), "kitchen");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(!options.clean_session());
        assert_eq!(options.credentials(), Some(("azazel".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_zero_keep_alive_is_clamped() {
        let config = MqttConfig {
            keep_alive_secs: 0,
            ..MqttConfig::default()
        };
        assert_eq!(mqtt_options(&config).keep_alive(), Duration::from_secs(1));
        assert!(mqtt_options(&config).credentials().is_none());
    }

    #[test]
    fn test_subscribe_without_broker_times_out() {
        let runtime = Runtime::new().unwrap();
        let config = MqttConfig {
            broker_host: "127.0.0.1".into(),
            broker_port: 1,
            ..MqttConfig::default()
        };
        let transport = MqttTransport::connect(&config, &runtime);

        let result = transport.subscribe("home/temp", QoS::AtMostOnce, Duration::from_millis(50));
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
        assert!(transport.publish("home/#", "x", QoS::AtMostOnce, false).is_err());
    }

    #[test]
    fn test_mailbox_delivery_reaches_waiting_subscriber() {
        let runtime = Runtime::new().unwrap();
        let transport = MqttTransport::connect(&MqttConfig::default(), &runtime);
        let mailbox = Arc::clone(&transport.mailbox);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            mailbox.deliver("door/state", "open").unwrap();
        });

        let message = transport
            .subscribe("door/state", QoS::AtMostOnce, Duration::from_secs(5))
            .unwrap();
        handle.join().unwrap();
        assert_eq!(message, "open");
    }
}
