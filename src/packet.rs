//! ASH frame kinds and control-byte dispatch.

use std::fmt::{Display, Formatter};
use std::io::{self, Error, ErrorKind};

pub use ack::Ack;
pub use data::Data;
pub use nak::Nak;
pub use rst::Rst;
pub use rst_ack::RstAck;

pub mod ack;
pub mod data;
pub mod error;
pub mod nak;
pub mod rst;
pub mod rst_ack;

const DATA_MASK: u8 = 0b1000_0000;
const SHORT_FRAME_MASK: u8 = 0b1110_0000;
const ACK_PREFIX: u8 = 0b1000_0000;
const NAK_PREFIX: u8 = 0b1010_0000;

/// Any ASH frame, decoded from an unstuffed frame body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Packet {
    Ack(Ack),
    Data(Data),
    Error(error::Error),
    Nak(Nak),
    Rst(Rst),
    RstAck(RstAck),
}

impl Packet {
    /// Determines whether the transmitted CRC checksum is valid.
    #[must_use]
    pub fn is_crc_valid(&self) -> bool {
        use crate::frame::Frame;

        match self {
            Self::Ack(ack) => ack.is_crc_valid(),
            Self::Data(data) => data.is_crc_valid(),
            Self::Error(error) => error.is_crc_valid(),
            Self::Nak(nak) => nak.is_crc_valid(),
            Self::Rst(rst) => rst.is_crc_valid(),
            Self::RstAck(rst_ack) => rst_ack.is_crc_valid(),
        }
    }
}

impl Display for Packet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ack(ack) => Display::fmt(ack, f),
            Self::Data(data) => Display::fmt(data, f),
            Self::Error(error) => Display::fmt(error, f),
            Self::Nak(nak) => Display::fmt(nak, f),
            Self::Rst(rst) => Display::fmt(rst, f),
            Self::RstAck(rst_ack) => Display::fmt(rst_ack, f),
        }
    }
}

impl TryFrom<&[u8]> for Packet {
    type Error = Error;

    fn try_from(buffer: &[u8]) -> io::Result<Self> {
        parse(buffer)
    }
}

fn parse(buffer: &[u8]) -> io::Result<Packet> {
    let Some(&control) = buffer.first() else {
        return Err(Error::new(ErrorKind::UnexpectedEof, "Empty frame body."));
    };

    if control & DATA_MASK == 0 {
        return Data::try_from(buffer).map(Packet::Data);
    }

    match control & SHORT_FRAME_MASK {
        ACK_PREFIX => Ack::try_from(buffer).map(Packet::Ack),
        NAK_PREFIX => Nak::try_from(buffer).map(Packet::Nak),
        _ => match control {
            Rst::HEADER => Rst::try_from(buffer).map(Packet::Rst),
            RstAck::HEADER => RstAck::try_from(buffer).map(Packet::RstAck),
            error::Error::HEADER => error::Error::try_from(buffer).map(Packet::Error),
            other => Err(Error::new(
                ErrorKind::InvalidData,
                format!("Invalid control byte: {other:#04X}."),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::Packet;

    #[test]
    fn test_data_dispatch() {
        let buffer = [0x25u8, 0x00, 0x00, 0x00, 0x02, 0x1A, 0xAD];
        assert!(matches!(
            Packet::try_from(buffer.as_slice()),
            Ok(Packet::Data(_))
        ));
    }

    #[test]
    fn test_ack_dispatch() {
        let buffer = [0x81u8, 0x60, 0x59];
        assert!(matches!(
            Packet::try_from(buffer.as_slice()),
            Ok(Packet::Ack(_))
        ));
    }

    #[test]
    fn test_nak_dispatch() {
        let buffer = [0xA6u8, 0x34, 0xDC];
        assert!(matches!(
            Packet::try_from(buffer.as_slice()),
            Ok(Packet::Nak(_))
        ));
    }

    #[test]
    fn test_rst_dispatch() {
        let buffer = [0xC0u8, 0x38, 0xBC];
        assert!(matches!(
            Packet::try_from(buffer.as_slice()),
            Ok(Packet::Rst(_))
        ));
    }

    #[test]
    fn test_rst_ack_dispatch() {
        let buffer = [0xC1u8, 0x02, 0x02, 0x9B, 0x7B];
        assert!(matches!(
            Packet::try_from(buffer.as_slice()),
            Ok(Packet::RstAck(_))
        ));
    }

    #[test]
    fn test_error_dispatch() {
        let buffer = [0xC2u8, 0x02, 0x51, 0xA8, 0xBD];
        assert!(matches!(
            Packet::try_from(buffer.as_slice()),
            Ok(Packet::Error(_))
        ));
    }

    #[test]
    fn test_invalid_control_byte() {
        let buffer = [0xC5u8, 0x00, 0x00];
        assert!(Packet::try_from(buffer.as_slice()).is_err());
    }

    #[test]
    fn test_empty_buffer() {
        assert!(Packet::try_from([].as_slice()).is_err());
    }
}
