//! ASH connection state machine and frame forge.

use log::{debug, error, trace, warn};

use crate::error::Error;
use crate::frame::Frame;
use crate::frame_buffer::FrameBuffer;
use crate::hex_slice::HexSlice;
use crate::packet::{Ack, Data, Nak, Packet, Rst};
use crate::protocol::{Stuff, CANCEL, FLAG};
use crate::status::Status;
use crate::types::{FrameVec, Payload, WireFrame, MAX_PAYLOAD_SIZE};
use crate::wrapping_u3::WrappingU3;

/// Session-level notifications produced while decoding the byte stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AshEvent {
    /// The reset handshake completed; the connection is established.
    Connected,
    /// The NCP reported a fatal condition via an `ERROR` frame.
    Disconnected,
    /// The outstanding `DATA` frame has been acknowledged.
    AckCleared,
    /// The NCP rejected our last `DATA` frame; it must be re-sent.
    NakReceived,
    /// A received `DATA` frame was rejected; a `NAK` must be emitted.
    Rejected,
    /// An in-sequence `DATA` frame was accepted; carries the EZSP payload.
    Received(Payload),
    /// The reset handshake timed out.
    ///
    /// Produced by the driver's ACK timer, not by the decoder itself.
    ResetFailed,
}

/// Encoder and decoder for ASH frames, owning the session state
/// and the two three-bit sequence counters.
#[derive(Debug)]
pub struct AshCodec {
    status: Status,
    frm_tx: WrappingU3,
    frm_rx: WrappingU3,
    decoder: FrameBuffer,
}

impl AshCodec {
    /// Creates a new codec in the disconnected state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: Status::Disconnected,
            frm_tx: WrappingU3::from_u8_lossy(0),
            frm_rx: WrappingU3::from_u8_lossy(0),
            decoder: FrameBuffer::new(),
        }
    }

    /// Returns the session status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Determines whether the session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == Status::Connected
    }

    /// Marks the reset handshake as failed after its timeout expired.
    pub fn reset_timed_out(&mut self) {
        self.status = Status::Failed;
    }

    /// Returns whether the NCP currently allows transmission.
    ///
    /// Tracks the last XON/XOFF byte seen on the receive stream.
    #[must_use]
    pub const fn xon(&self) -> bool {
        self.decoder.xon()
    }

    /// Produces a `RST` frame, preceded by a cancel byte so the NCP
    /// discards any partially received frame.
    ///
    /// Resets both sequence counters and enters the `ResetSent` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame does not fit its buffer.
    pub fn forge_reset_frame(&mut self) -> Result<WireFrame, Error> {
        self.frm_tx = WrappingU3::from_u8_lossy(0);
        self.frm_rx = WrappingU3::from_u8_lossy(0);
        self.status = Status::ResetSent;
        encode(&Rst::new(), true)
    }

    /// Produces an `ACK` frame carrying the next expected frame number.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame does not fit its buffer.
    pub fn forge_ack_frame(&self) -> Result<WireFrame, Error> {
        encode(&Ack::new(self.frm_rx, false), false)
    }

    /// Produces a `NAK` frame carrying the still-expected frame number.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame does not fit its buffer.
    pub fn forge_nak_frame(&self) -> Result<WireFrame, Error> {
        encode(&Nak::new(self.frm_rx, false), false)
    }

    /// Produces a `DATA` frame transporting the given EZSP payload.
    ///
    /// Stamps the transmit counter and the current acknowledgement number
    /// into the control byte and advances the transmit counter.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is established or the payload
    /// exceeds the maximum frame payload size.
    pub fn forge_data_frame(&mut self, payload: &[u8]) -> Result<WireFrame, Error> {
        if self.status != Status::Connected {
            return Err(Error::NotConnected(self.status));
        }

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let data = Data::new(self.frm_tx, self.frm_rx, payload)?;
        debug!("Forging {data}");
        let wire = encode(&data, false)?;
        self.frm_tx += 1;
        Ok(wire)
    }

    /// Feeds received bytes through the decoder and updates the session
    /// state for every complete frame.
    ///
    /// Returns the session events produced, in order; accepted `DATA`
    /// payloads are carried by [`AshEvent::Received`].
    pub fn append_incoming(&mut self, bytes: &[u8]) -> Vec<AshEvent> {
        let mut events = Vec::new();

        for &byte in bytes {
            if let Some(body) = self.decoder.feed(byte) {
                self.handle_frame(&body, &mut events);
            }
        }

        events
    }

    fn handle_frame(&mut self, body: &[u8], events: &mut Vec<AshEvent>) {
        let packet = match Packet::try_from(body) {
            Ok(packet) => packet,
            Err(error) => {
                warn!("Discarding invalid frame: {error}");
                trace!("Frame body was: {:#04X}", HexSlice::new(body));
                return;
            }
        };

        debug!("Received {packet}");

        if !packet.is_crc_valid() {
            warn!("Received {packet} with invalid CRC.");

            // A corrupted DATA frame sets the reject condition; other
            // corrupted frames are silently dropped.
            if matches!(packet, Packet::Data(_)) && self.is_connected() {
                events.push(AshEvent::Rejected);
            }

            return;
        }

        match packet {
            Packet::Data(data) => self.handle_data(data, events),
            Packet::Ack(ack) => {
                if ack.ack_num() == self.frm_tx {
                    events.push(AshEvent::AckCleared);
                } else {
                    trace!("Ignoring stale {ack}; expected ACK({}).", self.frm_tx);
                }
            }
            Packet::Nak(nak) => {
                warn!("NCP sent {nak}.");
                events.push(AshEvent::NakReceived);
            }
            Packet::RstAck(rst_ack) => {
                if self.status != Status::ResetSent {
                    warn!("Ignoring unexpected {rst_ack}.");
                    return;
                }

                if !rst_ack.is_ash_v2() {
                    error!("{rst_ack} is not ASHv2: {:#04X}", rst_ack.version());
                }

                match rst_ack.code() {
                    Ok(code) => trace!("NCP reset condition: {code}"),
                    Err(code) => warn!("NCP sent {rst_ack} with unknown code: {code:#04X}"),
                }

                self.frm_tx = WrappingU3::from_u8_lossy(0);
                self.frm_rx = WrappingU3::from_u8_lossy(0);
                self.status = Status::Connected;
                events.push(AshEvent::Connected);
            }
            Packet::Error(frame) => {
                match frame.code() {
                    Ok(code) => warn!("NCP sent error condition: {code}"),
                    Err(code) => warn!("NCP sent {frame} with unknown code: {code:#04X}"),
                }

                self.status = Status::Disconnected;
                events.push(AshEvent::Disconnected);
            }
            Packet::Rst(rst) => warn!("Ignoring unexpected {rst} from NCP."),
        }
    }

    fn handle_data(&mut self, data: Data, events: &mut Vec<AshEvent>) {
        if self.status != Status::Connected {
            warn!("Not connected. Dropping {data}.");
            return;
        }

        if data.frame_num() == self.frm_rx {
            self.frm_rx += 1;
            events.push(AshEvent::AckCleared);
            events.push(AshEvent::Received(data.unmasked_payload()));
        } else {
            warn!(
                "Received out-of-sequence {data}; still expecting frame {}.",
                self.frm_rx
            );
            events.push(AshEvent::Rejected);
        }
    }
}

impl Default for AshCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes a frame to its on-wire form: stuffed body plus the
/// terminating flag, optionally preceded by a cancel byte.
fn encode<F: Frame>(frame: &F, leading_cancel: bool) -> Result<WireFrame, Error> {
    let mut body = FrameVec::new();
    frame.buffer(&mut body)?;

    let mut wire = WireFrame::new();

    if leading_cancel {
        wire.push(CANCEL)
            .map_err(|_| crate::frame::overflow("wire"))?;
    }

    for byte in body.iter().copied().stuff() {
        wire.push(byte).map_err(|_| crate::frame::overflow("wire"))?;
    }

    wire.push(FLAG).map_err(|_| crate::frame::overflow("wire"))?;
    Ok(wire)
}
