//! Reset acknowledgment (`RSTACK`) frame.

use std::fmt::{Display, Formatter};
use std::io::{self, Error, ErrorKind};

use num_traits::FromPrimitive;

use crate::code::Code;
use crate::crc::CRC;
use crate::frame::{overflow, Frame};
use crate::types::FrameVec;

/// The NCP's acknowledgment of a reset, carrying the ASH version
/// and the cause of the reset.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RstAck {
    header: u8,
    version: u8,
    reset_code: u8,
    crc: u16,
}

impl RstAck {
    /// Constant header value for `RSTACK` frames.
    pub const HEADER: u8 = 0xC1;

    /// The size of the `RSTACK` frame in bytes.
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

    /// Returns the reset code.
    ///
    /// # Errors
    ///
    /// Returns the raw byte if the reset code is unknown.
    pub fn code(&self) -> Result<Code, u8> {
        Code::from_u8(self.reset_code).ok_or(self.reset_code)
    }
}

impl Display for RstAck {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.code() {
            Ok(code) => write!(f, "RSTACK({:#04X}, {code})", self.version),
            Err(code) => write!(f, "RSTACK({:#04X}, {code:#04X})", self.version),
        }
    }
}

impl Frame for RstAck {
    fn crc(&self) -> u16 {
        self.crc
    }

    fn calculate_crc(&self) -> u16 {
        CRC.checksum(&[self.header, self.version, self.reset_code])
    }

    fn buffer(&self, buffer: &mut FrameVec) -> io::Result<()> {
        buffer
            .extend_from_slice(&[self.header, self.version, self.reset_code])
            .map_err(|()| overflow("RSTACK"))?;
        buffer
            .extend_from_slice(&self.crc.to_be_bytes())
            .map_err(|()| overflow("RSTACK"))
    }
}

impl TryFrom<&[u8]> for RstAck {
    type Error = Error;

    fn try_from(buffer: &[u8]) -> io::Result<Self> {
        let [header, version, reset_code, crc0, crc1] = buffer else {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid RSTACK frame size.",
            ));
        };

        Ok(Self {
            header: *header,
            version: *version,
            reset_code: *reset_code,
            crc: u16::from_be_bytes([*crc0, *crc1]),
        })
    }
}
