//! Acknowledgement (`ACK`) frame.

use std::fmt::{Display, Formatter};
use std::io::{self, Error, ErrorKind};

use crate::crc::CRC;
use crate::frame::{overflow, Frame};
use crate::types::FrameVec;
use crate::wrapping_u3::WrappingU3;

const HEADER_PREFIX: u8 = 0b1000_0000;
const NOT_READY_MASK: u8 = 0b0000_1000;
const ACK_NUM_MASK: u8 = 0b0000_0111;

/// Acknowledges the receipt of every `DATA` frame up to,
/// but not including, the carried acknowledgement number.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ack {
    header: u8,
    crc: u16,
}

impl Ack {
    /// The size of the `ACK` frame in bytes.
    pub const SIZE: usize = 3;

    /// Creates a new `ACK` frame.
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

impl Display for Ack {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ACK({}){}",
            self.ack_num(),
            if self.not_ready() { '-' } else { '+' }
        )
    }
}

impl Frame for Ack {
    fn crc(&self) -> u16 {
        self.crc
    }

    fn calculate_crc(&self) -> u16 {
        CRC.checksum(&[self.header])
    }

    fn buffer(&self, buffer: &mut FrameVec) -> io::Result<()> {
        buffer.push(self.header).map_err(|_| overflow("ACK"))?;
        buffer
            .extend_from_slice(&self.crc.to_be_bytes())
            .map_err(|()| overflow("ACK"))
    }
}

impl TryFrom<&[u8]> for Ack {
    type Error = Error;

    fn try_from(buffer: &[u8]) -> io::Result<Self> {
        let [header, crc0, crc1] = buffer else {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid ACK frame size.",
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
    use super::Ack;
    use crate::frame::Frame;
    use crate::wrapping_u3::WrappingU3;

    const ACK1: Ack = Ack {
        header: 0x81,
        crc: 0x6059,
    };
    const ACK2: Ack = Ack {
        header: 0x8E,
        crc: 0x91B6,
    };

    #[test]
    fn test_ack_num() {
        assert_eq!(ACK1.ack_num().as_u8(), 1);
        assert_eq!(ACK2.ack_num().as_u8(), 6);
    }

    #[test]
    fn test_not_ready() {
        assert!(!ACK1.not_ready());
        assert!(ACK2.not_ready());
    }

    #[test]
    fn test_to_string() {
        assert_eq!(&ACK1.to_string(), "ACK(1)+");
        assert_eq!(&ACK2.to_string(), "ACK(6)-");
    }

    #[test]
    fn test_is_crc_valid() {
        assert!(ACK1.is_crc_valid());
        assert!(ACK2.is_crc_valid());
    }

    #[test]
    fn test_new() {
        for ack_num in u8::MIN..=u8::MAX {
            let ack = Ack::new(WrappingU3::from_u8_lossy(ack_num), false);
            assert_eq!(ack.ack_num().as_u8(), ack_num % 8);
            assert!(ack.is_crc_valid());
        }
    }

    #[test]
    fn test_from_buffer() {
        assert_eq!(
            Ack::try_from([0x81u8, 0x60, 0x59].as_slice())
                .expect("Reference frame should be a valid ACK."),
            ACK1
        );
    }
}
