// ============================================================================
// File: packages/vmhost/src/channel/frame.rs
// ----------------------------------------------------------------------------
// Control frame layout.
//
//   byte 0      frame type
//   bytes 1..4  reserved, zero on write, ignored on read
//   bytes 4..8  payload length, u32 little-endian
//   then        payload
// ============================================================================

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::errors::{ChannelError, ChannelResult};

/// Fixed header size
pub const HEADER_LEN: usize = 8;

/// Message type carried in byte 0 of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Ask the peer for its clipboard
    ReadRequest = 0,
    /// Clipboard is empty
    WriteEmpty = 1,
    /// Clipboard text follows
    WriteText = 2,
    /// URL to open follows
    OpenUrl = 3,
}

impl FrameType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameType::ReadRequest),
            1 => Ok(FrameType::WriteEmpty),
            2 => Ok(FrameType::WriteText),
            3 => Ok(FrameType::OpenUrl),
            other => Err(other),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameType::ReadRequest => "READ_REQUEST",
            FrameType::WriteEmpty => "WRITE_EMPTY",
            FrameType::WriteText => "WRITE_TEXT",
            FrameType::OpenUrl => "OPEN_URL",
        };
        f.write_str(name)
    }
}

/// One typed, length-prefixed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Bytes,
}

impl Frame {
    pub fn new<P: Into<Bytes>>(frame_type: FrameType, payload: P) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// Frame with no payload
    pub fn empty(frame_type: FrameType) -> Self {
        Self::new(frame_type, Bytes::new())
    }

    /// Header followed by payload, in one contiguous buffer
    pub fn encode(&self) -> ChannelResult<Bytes> {
        let len = u32::try_from(self.payload.len()).map_err(|_| ChannelError::PayloadTooLarge {
            len: self.payload.len(),
        })?;

        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_slice(&encode_header(self.frame_type.as_u8(), len));
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }
}

pub(crate) fn encode_header(type_byte: u8, payload_len: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = type_byte;
    header[4..].copy_from_slice(&payload_len.to_le_bytes());
    header
}

/// Split a header into its raw type byte and payload length
pub(crate) fn decode_header(header: &[u8; HEADER_LEN]) -> (u8, u32) {
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (header[0], len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_fixed() {
        let bytes = Frame::new(FrameType::WriteText, &b"hello"[..])
            .encode()
            .expect("encode");
        assert_eq!(&bytes[..HEADER_LEN], &[2, 0, 0, 0, 5, 0, 0, 0]);
        assert_eq!(&bytes[HEADER_LEN..], b"hello");
    }

    #[test]
    fn empty_frame_is_header_only() {
        let bytes = Frame::empty(FrameType::ReadRequest).encode().expect("encode");
        assert_eq!(bytes.as_ref(), &[0u8; HEADER_LEN]);
    }

    #[test]
    fn reserved_bytes_are_ignored_on_decode() {
        let header = [3, 0xAA, 0xBB, 0xCC, 0x10, 0x01, 0, 0];
        assert_eq!(decode_header(&header), (3, 0x0110));
    }

    #[test]
    fn type_byte_mapping() {
        for frame_type in [
            FrameType::ReadRequest,
            FrameType::WriteEmpty,
            FrameType::WriteText,
            FrameType::OpenUrl,
        ] {
            assert_eq!(FrameType::try_from(frame_type.as_u8()), Ok(frame_type));
        }
        assert_eq!(FrameType::try_from(4), Err(4));
    }
}
