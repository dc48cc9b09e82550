//! Negative acknowledgement (`NAK`) frame.

use std::fmt::{Display, Formatter};
use std::io::{self, Error, ErrorKind};

use crate::crc::CRC;
use crate::frame::{overflow, Frame};
use crate::types::FrameVec;
use crate::wrapping_u3::WrappingU3;

const HEADER_PREFIX: u8 = 0b1010_0000;
const NOT_READY_MASK: u8 = 0b0000_1000;
const ACK_NUM_MASK: u8 = 0b0000_0111;

/// Rejects a received `DATA` frame and names the frame number
/// the receiver still expects.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Nak {
    header: u8,
    crc: u16,
}

impl Nak {
    /// The size of the `NAK` frame in bytes.
    pub const SIZE: usize = 3;

    /// Creates a new `NAK` frame.
    #[must_use]
    pub fn new(ack_num: WrappingU3, not_ready: bool) -> Self {
        let mut header = HEADER_PREFIX | ack_num.as_u8();

        if not_ready {
            header |= NOT_READY_MASK;
        }

        Self {
            header,
            crc: CRC.checksum(&[header]),
        }
    }

    /// Returns the acknowledgement number.
    #[must_use]
    pub const fn ack_num(&self) -> WrappingU3 {
        WrappingU3::from_u8_lossy(self.header & ACK_NUM_MASK)
    }

    /// Determines whether the not-ready flag is set.
    #[must_use]
    pub const fn not_ready(&self) -> bool {
        (self.header & NOT_READY_MASK) != 0
    }
}

impl Display for Nak {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NAK({}){}",
            self.ack_num(),
            if self.not_ready() { '-' } else { '+' }
        )
    }
}

impl Frame for Nak {
    fn crc(&self) -> u16 {
        self.crc
    }

    fn calculate_crc(&self) -> u16 {
        CRC.checksum(&[self.header])
    }

    fn buffer(&self, buffer: &mut FrameVec) -> io::Result<()> {
        buffer.push(self.header).map_err(|_| overflow("NAK"))?;
        buffer
            .extend_from_slice(&self.crc.to_be_bytes())
            .map_err(|()| overflow("NAK"))
    }
}

impl TryFrom<&[u8]> for Nak {
    type Error = Error;

    fn try_from(buffer: &[u8]) -> io::Result<Self> {
        let [header, crc0, crc1] = buffer else {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid NAK frame size.",
            ));
        };

        Ok(Self {
            header: *header,
            crc: u16::from_be_bytes([*crc0, *crc1]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Nak;
    use crate::frame::Frame;
    use crate::wrapping_u3::WrappingU3;

    #[test]
    fn test_new() {
        let nak = Nak::new(WrappingU3::from_u8_lossy(2), false);
        assert_eq!(nak.ack_num().as_u8(), 2);
        assert!(!nak.not_ready());
        assert!(nak.is_crc_valid());
    }

    #[test]
    fn test_to_string() {
        assert_eq!(&Nak::new(WrappingU3::from_u8_lossy(5), false).to_string(), "NAK(5)+");
        assert_eq!(&Nak::new(WrappingU3::from_u8_lossy(5), true).to_string(), "NAK(5)-");
    }

    #[test]
    fn test_buffer_round_trip() {
        let nak = Nak::new(WrappingU3::from_u8_lossy(3), false);
        let mut buffer = crate::types::FrameVec::new();
        nak.buffer(&mut buffer).expect("NAK should fit the buffer.");
        assert_eq!(
            Nak::try_from(&buffer[..]).expect("Serialized NAK should parse."),
            nak
        );
    }
}
