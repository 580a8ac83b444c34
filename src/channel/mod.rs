// ============================================================================
// File: packages/vmhost/src/channel/mod.rs
// ----------------------------------------------------------------------------
// Framed control channel between host and guest.
//
// One frame is one logical request or response: an 8-byte header (type,
// reserved padding, little-endian payload length) followed by the payload.
// ============================================================================

mod codec;
mod errors;
mod frame;

pub use codec::{read_frame, write_frame, ControlChannel, FrameReader, FrameSender};
pub use errors::{ChannelError, ChannelResult};
pub use frame::{Frame, FrameType, HEADER_LEN};
