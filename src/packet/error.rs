//! `ERROR` frame.

use std::fmt::{Display, Formatter};
use std::io::{self, ErrorKind};

use num_traits::FromPrimitive;

use crate::code::Code;
use crate::crc::CRC;
use crate::frame::{overflow, Frame};
use crate::types::FrameVec;

/// Reports a fatal NCP condition; the connection must be re-established.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    header: u8,
    version: u8,
    code: u8,
    crc: u16,
}

impl Error {
    /// Constant header value for `ERROR` frames.
    pub const HEADER: u8 = 0xC2;

    /// The size of the `ERROR` frame in bytes.
    pub const SIZE: usize = 5;

    /// Returns the protocol version.
    ///
    /// This is statically set to `0x02` (2) for `ASHv2`.
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Verifies that this is indeed `ASHv2`.
    #[must_use]
    pub const fn is_ash_v2(&self) -> bool {
        self.version == crate::VERSION
    }

    /// Returns the error code.
    ///
    /// # Errors
    ///
    /// Returns the raw byte if the error code is unknown.
    pub fn code(&self) -> Result<Code, u8> {
        Code::from_u8(self.code).ok_or(self.code)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ERROR({:#04X}, {:#04X})", self.version, self.code)
    }
}

impl Frame for Error {
    fn crc(&self) -> u16 {
        self.crc
    }

    fn calculate_crc(&self) -> u16 {
        CRC.checksum(&[self.header, self.version, self.code])
    }

    fn buffer(&self, buffer: &mut FrameVec) -> io::Result<()> {
        buffer
            .extend_from_slice(&[self.header, self.version, self.code])
            .map_err(|()| overflow("ERROR"))?;
        buffer
            .extend_from_slice(&self.crc.to_be_bytes())
            .map_err(|()| overflow("ERROR"))
    }
}

impl TryFrom<&[u8]> for Error {
    type Error = io::Error;

    fn try_from(buffer: &[u8]) -> io::Result<Self> {
        let [header, version, code, crc0, crc1] = buffer else {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "Invalid ERROR frame size.",
            ));
        };

        Ok(Self {
            header: *header,
            version: *version,
            code: *code,
            crc: u16::from_be_bytes([*crc0, *crc1]),
        })
    }
}
