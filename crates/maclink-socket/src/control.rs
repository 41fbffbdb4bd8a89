//! Keepalive traffic carried in CONTROL frames.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// CONTROL message type: liveness probe.
pub const CONTROL_PING: &str = "ping";
/// CONTROL message type: answer to a probe.
pub const CONTROL_PONG: &str = "pong";

/// CONTROL frame payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl ControlMessage {
    /// Create a ping carrying a probe sequence number.
    pub fn ping(seq: u64) -> Self {
        Self {
            msg_type: CONTROL_PING.to_string(),
            seq: Some(seq),
        }
    }

    /// Create the pong answering `ping`.
    pub fn pong_for(ping: &ControlMessage) -> Self {
        Self {
            msg_type: CONTROL_PONG.to_string(),
            seq: ping.seq,
        }
    }

    pub fn is_ping(&self) -> bool {
        self.msg_type == CONTROL_PING
    }

    pub fn is_pong(&self) -> bool {
        self.msg_type == CONTROL_PONG
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_pong_share_sequence() {
        let ping = ControlMessage::ping(7);
        let wire = ping.encode().unwrap();
        assert_eq!(wire, br#"{"type":"ping","seq":7}"#);

        let decoded = ControlMessage::decode(&wire).unwrap();
        assert!(decoded.is_ping());

        let pong = ControlMessage::pong_for(&decoded);
        assert!(pong.is_pong());
        assert_eq!(pong.seq, Some(7));
    }

    #[test]
    fn sequence_is_optional() {
        let msg = ControlMessage::decode(br#"{"type":"pong"}"#).unwrap();
        assert!(msg.is_pong());
        assert_eq!(msg.seq, None);
    }

    #[test]
    fn garbage_is_an_encoding_error() {
        let err = ControlMessage::decode(b"not json").unwrap_err();
        assert!(matches!(err, crate::SocketError::Encoding(_)));
    }
}
