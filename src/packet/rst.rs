//! Reset request (`RST`) frame.

use std::fmt::{Display, Formatter};
use std::io::{self, Error, ErrorKind};

use crate::crc::CRC;
use crate::frame::{overflow, Frame};
use crate::types::FrameVec;

/// Requests the NCP to perform a software reset.
///
/// Valid in any NCP state, including `FAILED`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rst {
    header: u8,
    crc: u16,
}

impl Rst {
    /// Constant header value for `RST` frames.
    pub const HEADER: u8 = 0xC0;

    /// The size of the `RST` frame in bytes.
    pub const SIZE: usize = 3;

    const CRC: u16 = 0x38BC;

    /// Creates a new `RST` frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            header: Self::HEADER,
            crc: Self::CRC,
        }
    }
}

impl Default for Rst {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Rst {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RST()")
    }
}

impl Frame for Rst {
    fn crc(&self) -> u16 {
        self.crc
    }

    fn calculate_crc(&self) -> u16 {
        CRC.checksum(&[self.header])
    }

    fn buffer(&self, buffer: &mut FrameVec) -> io::Result<()> {
        buffer.push(self.header).map_err(|_| overflow("RST"))?;
        buffer
            .extend_from_slice(&self.crc.to_be_bytes())
            .map_err(|()| overflow("RST"))
    }
}

impl TryFrom<&[u8]> for Rst {
    type Error = Error;

    fn try_from(buffer: &[u8]) -> io::Result<Self> {
        let [header, crc0, crc1] = buffer else {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid RST frame size.",
            ));
        };

        Ok(Self {
            header: *header,
            crc: u16::from_be_bytes([*crc0, *crc1]),
        })
    }
}
