//! Event payload types for the learning session observer lists

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

/// Transmitter connection lifecycle notification
///
/// Emitted when the single transmitter slot is taken or released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmitterStatus {
    /// True when a transmitter just attached, false when it detached
    pub connected: bool,
    /// Remote address of the transmitter, when known
    pub peer: Option<SocketAddr>,
    /// When the transition happened
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TransmitterStatus {
    pub fn attached(peer: SocketAddr) -> Self {
        Self {
            connected: true,
            peer: Some(peer),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn detached(peer: SocketAddr) -> Self {
        Self {
            connected: false,
            peer: Some(peer),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Captured signal notification
///
/// Emitted after a signal frame has been merged into the selected model.
/// Carries everything an observer needs to describe the capture without
/// re-reading controller state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// Identifier of the model the signal was merged into
    pub model_id: Uuid,
    /// Name of the model at capture time
    pub model_name: String,
    /// Operating mode the signal was filed under
    pub mode: i64,
    /// Output temperature the signal was filed under
    pub output: i64,
    /// The opaque encoded signal, as received
    pub encoded_signal: String,
    /// When the capture was applied
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmitter_status_serialization() {
        let status = TransmitterStatus::attached("127.0.0.1:4131".parse().unwrap());

        let json = serde_json::to_string(&status).unwrap();
        let parsed: TransmitterStatus = serde_json::from_str(&json).unwrap();

        assert!(parsed.connected);
        assert_eq!(parsed.peer, status.peer);
    }

    #[test]
    fn test_capture_event_round_trip() {
        let event = CaptureEvent {
            model_id: Uuid::new_v4(),
            model_name: "tesla".to_string(),
            mode: 1,
            output: 21,
            encoded_signal: "123123123".to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: CaptureEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.model_id, event.model_id);
        assert_eq!(parsed.mode, 1);
        assert_eq!(parsed.output, 21);
        assert_eq!(parsed.encoded_signal, "123123123");
    }
}
