use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + flags (1) + reserved (1) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "ML" (0x4D 0x4C).
pub const MAGIC: [u8; 2] = [0x4D, 0x4C];

/// Another frame of the same message follows this one.
pub const FLAG_MORE: u8 = 0x01;

/// Keepalive traffic; never part of a message.
pub const FLAG_CONTROL: u8 = 0x02;

const KNOWN_FLAGS: u8 = FLAG_MORE | FLAG_CONTROL;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Part of an application message.
    Data,
    /// Keepalive traffic.
    Control,
}

/// One frame as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Set when another frame of the same message follows.
    pub more: bool,
    pub payload: Bytes,
}

impl Frame {
    /// A data frame that ends its message.
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: FrameKind::Data,
            more: false,
            payload: payload.into(),
        }
    }

    /// A control frame.
    pub fn control(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: FrameKind::Control,
            more: false,
            payload: payload.into(),
        }
    }

    /// Set the MORE flag.
    pub fn with_more(mut self, more: bool) -> Self {
        self.more = more;
        self
    }

    /// Header flag byte for this frame.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.more {
            flags |= FLAG_MORE;
        }
        if self.kind == FrameKind::Control {
            flags |= FLAG_CONTROL;
        }
        flags
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────┬──────────┬───────────┬──────────────────┐
/// │ Magic (2B) │ Flags (1B)│ Rsvd (1B)│ Length    │ Payload          │
/// │ "ML"       │ MORE|CTRL │ 0x00     │ (4B LE)   │ (Length bytes)   │
/// └────────────┴───────────┴──────────┴───────────┴──────────────────┘
/// ```
pub fn encode_frame(flags: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    validate_flags(flags)?;
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u8(flags);
    dst.put_u8(0);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let flags = src[2];
    validate_flags(flags)?;
    if src[3] != 0 {
        return Err(FrameError::NonZeroReserved(src[3]));
    }

    let payload_len = u32::from_le_bytes([src[4], src[5], src[6], src[7]]) as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    let kind = if flags & FLAG_CONTROL != 0 {
        FrameKind::Control
    } else {
        FrameKind::Data
    };

    Ok(Some(Frame {
        kind,
        more: flags & FLAG_MORE != 0,
        payload,
    }))
}

fn validate_flags(flags: u8) -> Result<()> {
    if flags & !KNOWN_FLAGS != 0 {
        return Err(FrameError::InvalidFlags(flags));
    }
    if flags & FLAG_CONTROL != 0 && flags & FLAG_MORE != 0 {
        return Err(FrameError::ControlWithMore);
    }
    Ok(())
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"{\"cmd\": \"g.show\"}";

        encode_frame(0, payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.kind, FrameKind::Data);
        assert!(!frame.more);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_more_and_control_flags_survive() {
        let mut buf = BytesMut::new();
        encode_frame(FLAG_MORE, b"cmd", &mut buf).unwrap();
        encode_frame(FLAG_CONTROL, b"{\"type\":\"ping\"}", &mut buf).unwrap();

        let topic = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(topic.kind, FrameKind::Data);
        assert!(topic.more);

        let ping = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(ping.kind, FrameKind::Control);
        assert!(!ping.more);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x4D, 0x4C, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(0, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_unknown_flag_bits() {
        let mut buf = BytesMut::from(&[0x4D, 0x4C, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidFlags(0x80))));
    }

    #[test]
    fn test_decode_non_zero_reserved() {
        let mut buf = BytesMut::from(&[0x4D, 0x4C, 0x00, 0x07, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::NonZeroReserved(7))));
    }

    #[test]
    fn test_control_with_more_rejected_both_ways() {
        let mut buf = BytesMut::new();
        let err = encode_frame(FLAG_CONTROL | FLAG_MORE, b"x", &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ControlWithMore));

        let mut raw = BytesMut::from(&[0x4D, 0x4C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut raw, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::ControlWithMore)));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u32_le(1024 * 1024 * 32);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(0, b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_flags_and_wire_size() {
        let frame = Frame::data(Bytes::from_static(b"test")).with_more(true);
        assert_eq!(frame.flags(), FLAG_MORE);
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
        assert_eq!(Frame::control("p").flags(), FLAG_CONTROL);
    }
}
