//! `DATA` frame carrying an EZSP payload.

use std::fmt::{Display, Formatter};
use std::io::{self, Error, ErrorKind};

use crate::crc::CRC;
use crate::frame::{overflow, Frame};
use crate::protocol::Mask;
use crate::types::{FrameVec, Payload, MAX_PAYLOAD_SIZE};
use crate::wrapping_u3::WrappingU3;

const ACK_NUM_MASK: u8 = 0b0000_0111;
const RETRANSMIT_MASK: u8 = 0b0000_1000;
const FRAME_NUM_MASK: u8 = 0b0111_0000;
const FRAME_NUM_OFFSET: u8 = 4;

/// A sequenced frame transporting an EZSP frame as its payload.
///
/// The payload is stored in its masked on-wire form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Data {
    header: u8,
    payload: Payload,
    crc: u16,
}

impl Data {
    /// Creates a new `DATA` frame, masking the given EZSP payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload exceeds [`MAX_PAYLOAD_SIZE`] bytes.
    pub fn new(frame_num: WrappingU3, ack_num: WrappingU3, payload: &[u8]) -> io::Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Payload too large: {} bytes.", payload.len()),
            ));
        }

        let header = ((frame_num.as_u8() << FRAME_NUM_OFFSET) & FRAME_NUM_MASK)
            | (ack_num.as_u8() & ACK_NUM_MASK);
        let mut masked = Payload::new();

        for byte in payload.iter().copied().mask() {
            masked
                .push(byte)
                .expect("Masked payload should fit: size was checked above.");
        }

        Ok(Self {
            crc: calculate_crc(header, &masked),
            header,
            payload: masked,
        })
    }

    /// Returns the frame number.
    #[must_use]
    pub const fn frame_num(&self) -> WrappingU3 {
        WrappingU3::from_u8_lossy((self.header & FRAME_NUM_MASK) >> FRAME_NUM_OFFSET)
    }

    /// Returns the acknowledgement number.
    #[must_use]
    pub const fn ack_num(&self) -> WrappingU3 {
        WrappingU3::from_u8_lossy(self.header & ACK_NUM_MASK)
    }

    /// Returns the retransmit flag.
    #[must_use]
    pub const fn is_retransmission(&self) -> bool {
        (self.header & RETRANSMIT_MASK) != 0
    }

    /// Returns the payload in its masked on-wire form.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the unmasked EZSP payload.
    #[must_use]
    pub fn unmasked_payload(&self) -> Payload {
        let mut unmasked = Payload::new();

        for byte in self.payload.iter().copied().mask() {
            unmasked
                .push(byte)
                .expect("Unmasked payload should be as large as the masked one.");
        }

        unmasked
    }
}

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DATA({}, {}, {})",
            self.frame_num(),
            self.ack_num(),
            u8::from(self.is_retransmission())
        )
    }
}

impl Frame for Data {
    fn crc(&self) -> u16 {
        self.crc
    }

    fn calculate_crc(&self) -> u16 {
        calculate_crc(self.header, &self.payload)
    }

    fn buffer(&self, buffer: &mut FrameVec) -> io::Result<()> {
        buffer.push(self.header).map_err(|_| overflow("DATA"))?;
        buffer
            .extend_from_slice(&self.payload)
            .map_err(|()| overflow("DATA"))?;
        buffer
            .extend_from_slice(&self.crc.to_be_bytes())
            .map_err(|()| overflow("DATA"))
    }
}

impl TryFrom<&[u8]> for Data {
    type Error = Error;

    fn try_from(buffer: &[u8]) -> io::Result<Self> {
        if buffer.len() < 3 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid DATA frame size.",
            ));
        }

        let payload = &buffer[1..(buffer.len() - 2)];
        let mut masked = Payload::new();
        masked.extend_from_slice(payload).map_err(|()| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Payload too large: {} bytes.", payload.len()),
            )
        })?;

        Ok(Self {
            header: buffer[0],
            payload: masked,
            crc: u16::from_be_bytes([buffer[buffer.len() - 2], buffer[buffer.len() - 1]]),
        })
    }
}

fn calculate_crc(header: u8, payload: &Payload) -> u16 {
    let mut digest = CRC.digest();
    digest.update(&[header]);
    digest.update(payload);
    digest.finalize()
}
