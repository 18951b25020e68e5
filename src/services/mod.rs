//! External collaborators used by commands: message transport and speech

pub mod mqtt;
pub mod speech;
pub mod transport;

pub use mqtt::MqttTransport;
pub use speech::{ProgramSpeaker, SpeechOutput};
pub use transport::{InProcessBroker, MessageTransport, QoS, TransportError};
