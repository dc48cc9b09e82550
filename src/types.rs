//! Buffer types shared across the crate.

/// Maximum size of an EZSP frame carried in a single `DATA` frame.
pub const MAX_PAYLOAD_SIZE: usize = 128;

/// Maximum size of an unstuffed frame body: control byte, payload and CRC.
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + 4;

/// Maximum size of a frame on the wire.
///
/// Worst case every body byte is escaped, plus a leading `CANCEL`
/// and the trailing `FLAG`.
pub const MAX_WIRE_FRAME_SIZE: usize = MAX_FRAME_SIZE * 2 + 2;

/// An EZSP frame extracted from or destined for a `DATA` frame.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_SIZE>;

/// An unstuffed frame body.
pub type FrameVec = heapless::Vec<u8, MAX_FRAME_SIZE>;

/// A fully framed byte sequence as written to the serial port.
pub type WireFrame = heapless::Vec<u8, MAX_WIRE_FRAME_SIZE>;
