//! Publish/subscribe message transport
//!
//! Commands talk to the transport through [`MessageTransport`]. The network
//! client is [`crate::services::mqtt::MqttTransport`]; [`InProcessBroker`]
//! provides the same contract in memory (retained messages, blocking
//! subscribe with a timeout) for tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out after {timeout:?} waiting for a message on {topic}")]
    Timeout { topic: String, timeout: Duration },

    #[error("invalid QoS level {0}")]
    InvalidQos(u8),

    #[error("publish to {topic} rejected: {reason}")]
    Rejected { topic: String, reason: String },

    #[error("transport closed")]
    Closed,
}

/// Delivery guarantee requested for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QoS {
    type Error = TransportError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(TransportError::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Capability to publish to and read from topics
pub trait MessageTransport: Send + Sync {
    /// Publish `payload` on `topic`
    fn publish(&self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<(), TransportError>;

    /// Subscribe to `topic` and block until a message arrives or `timeout` passes
    fn subscribe(&self, topic: &str, qos: QoS, timeout: Duration) -> Result<String, TransportError>;
}

#[derive(Default)]
struct MailboxState {
    /// Latest message per topic with its sequence number
    latest: HashMap<String, (u64, String)>,
    sequence: u64,
}

/// Latest message per topic, with blocking waits for newer ones
#[derive(Default)]
pub(crate) struct Mailbox {
    state: Mutex<MailboxState>,
    arrived: Condvar,
}

impl Mailbox {
    /// Store `payload` as the newest message on `topic` and wake waiters
    pub(crate) fn deliver(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().map_err(|_| TransportError::Closed)?;
        state.sequence += 1;
        let sequence = state.sequence;
        state
            .latest
            .insert(topic.to_string(), (sequence, payload.to_string()));
        drop(state);

        self.arrived.notify_all();
        Ok(())
    }

    /// Sequence number of the newest message seen on `topic` so far
    pub(crate) fn mark(&self, topic: &str) -> Result<u64, TransportError> {
        let state = self.state.lock().map_err(|_| TransportError::Closed)?;
        Ok(state.latest.get(topic).map(|(seq, _)| *seq).unwrap_or(0))
    }

    /// Wait for a message on `topic` newer than `seen`
    pub(crate) fn wait_after(&self, topic: &str, seen: u64, timeout: Duration) -> Result<String, TransportError> {
        let state = self.state.lock().map_err(|_| TransportError::Closed)?;
        let (state, wait) = self
            .arrived
            .wait_timeout_while(state, timeout, |s| {
                s.latest.get(topic).map(|(seq, _)| *seq).unwrap_or(0) <= seen
            })
            .map_err(|_| TransportError::Closed)?;

        if wait.timed_out() {
            return Err(TransportError::Timeout {
                topic: topic.to_string(),
                timeout,
            });
        }

        state
            .latest
            .get(topic)
            .map(|(_, payload)| payload.clone())
            .ok_or(TransportError::Closed)
    }
}

/// Rejects empty topics and wildcards, which are not valid publish targets
pub(crate) fn check_publish_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() || topic.contains(&['+', '#'][..]) {
        return Err(TransportError::Rejected {
            topic: topic.to_string(),
            reason: "publish topics must be non-empty and contain no wildcards".into(),
        });
    }
    Ok(())
}

/// In-memory broker with retained messages
///
/// Nothing outside the process can reach it; it stands in for a network
/// broker in tests.
#[derive(Default)]
pub struct InProcessBroker {
    retained: Mutex<HashMap<String, String>>,
    mailbox: Mailbox,
}

impl InProcessBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageTransport for InProcessBroker {
    fn publish(&self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<(), TransportError> {
        check_publish_topic(topic)?;

        if retain {
            let mut retained = self.retained.lock().map_err(|_| TransportError::Closed)?;
            if payload.is_empty() {
                retained.remove(topic);
            } else {
                retained.insert(topic.to_string(), payload.to_string());
            }
        }
        self.mailbox.deliver(topic, payload)?;

        tracing::debug!("Published {} bytes to {} ({:?}, retain={})", payload.len(), topic, qos, retain);
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS, timeout: Duration) -> Result<String, TransportError> {
        // Mark first so a publish racing the retained lookup is still seen
        let seen = self.mailbox.mark(topic)?;

        let retained = self.retained.lock().map_err(|_| TransportError::Closed)?;
        if let Some(message) = retained.get(topic) {
            tracing::debug!("Delivering retained message on {} ({:?})", topic, qos);
            return Ok(message.clone());
        }
        drop(retained);

        self.mailbox.wait_after(topic, seen, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_retained_message_returned_immediately() {
        let broker = InProcessBroker::new();
        broker
            .publish("home/temp", "21.5", QoS::AtLeastOnce, true)
            .unwrap();
        let message = broker
            .subscribe("home/temp", QoS::AtLeastOnce, Duration::from_millis(10))
            .unwrap();
        assert_eq!(message, "21.5");
    }

    #[test]
    fn test_subscribe_times_out() {
        let broker = InProcessBroker::new();
        broker
            .publish("home/temp", "21.5", QoS::AtMostOnce, false)
            .unwrap();
        let result = broker.subscribe("home/temp", QoS::AtMostOnce, Duration::from_millis(20));
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }

    #[test]
    fn test_subscribe_receives_later_publish() {
        let broker = Arc::new(InProcessBroker::new());
        let publisher = Arc::clone(&broker);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            publisher
                .publish("door/state", "open", QoS::AtMostOnce, false)
                .unwrap();
        });

        let message = broker
            .subscribe("door/state", QoS::AtMostOnce, Duration::from_secs(5))
            .unwrap();
        handle.join().unwrap();
        assert_eq!(message, "open");
    }

    #[test]
    fn test_empty_retained_payload_clears() {
        let broker = InProcessBroker::new();
        broker.publish("a/b", "x", QoS::AtMostOnce, true).unwrap();
        broker.publish("a/b", "", QoS::AtMostOnce, true).unwrap();
        assert!(broker
            .subscribe("a/b", QoS::AtMostOnce, Duration::from_millis(5))
            .is_err());
    }

    #[test]
    fn test_qos_conversion() {
        assert_eq!(QoS::try_from(1).unwrap(), QoS::AtLeastOnce);
        assert!(matches!(QoS::try_from(3), Err(TransportError::InvalidQos(3))));
        assert!(InProcessBroker::new()
            .publish("a/#", "x", QoS::AtMostOnce, false)
            .is_err());
    }
}
