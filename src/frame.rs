use std::fmt::{Debug, Display};
use std::io;

use crate::types::FrameVec;

/// Common behavior of all ASH frames.
pub trait Frame: Debug + Display {
    /// Returns the CRC checksum transmitted with the frame.
    fn crc(&self) -> u16;

    /// Calculates the CRC checksum over the frame body.
    fn calculate_crc(&self) -> u16;

    /// Determines whether the transmitted CRC checksum is valid.
    fn is_crc_valid(&self) -> bool {
        self.crc() == self.calculate_crc()
    }

    /// Serializes the frame body, including the checksum, into `buffer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame does not fit into the buffer.
    fn buffer(&self, buffer: &mut FrameVec) -> io::Result<()>;
}

/// Returns the buffer-overflow error used by [`Frame::buffer`] implementations.
pub(crate) fn overflow(frame: &'static str) -> io::Error {
    io::Error::new(
        io::ErrorKind::OutOfMemory,
        format!("{frame}: frame buffer overflow"),
    )
}
