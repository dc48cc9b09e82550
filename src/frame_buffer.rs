//! Incremental decoder for the raw ASH byte stream.

use log::{trace, warn};

use crate::hex_slice::HexSlice;
use crate::protocol::{CANCEL, COMPLEMENT_BIT, ESCAPE, FLAG, SUBSTITUTE, X_OFF, X_ON};
use crate::types::FrameVec;

/// Collects bytes between frame flags, undoing byte stuffing on the fly.
///
/// The buffer is fed one byte at a time and yields a complete, unstuffed
/// frame body whenever a `FLAG` terminates a clean frame. `CANCEL` discards
/// the frame in progress, `SUBSTITUTE` poisons it until the next `FLAG`,
/// and XON/XOFF are consumed while remembering the transmission state.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: FrameVec,
    escape: bool,
    corrupt: bool,
    xon: bool,
}

impl FrameBuffer {
    /// Creates a new, empty frame buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: FrameVec::new(),
            escape: false,
            corrupt: false,
            xon: true,
        }
    }

    /// Returns whether transmission is allowed (no XOFF pending).
    #[must_use]
    pub const fn xon(&self) -> bool {
        self.xon
    }

    /// Discards any frame in progress.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.escape = false;
        self.corrupt = false;
    }

    /// Feeds a single received byte.
    ///
    /// Returns a complete unstuffed frame body when `byte` terminates one.
    pub fn feed(&mut self, byte: u8) -> Option<FrameVec> {
        match byte {
            CANCEL => {
                trace!("Discarding frame in progress due to cancel byte.");
                self.reset();
                None
            }
            FLAG => {
                let complete = !self.corrupt && !self.escape && !self.buffer.is_empty();
                let frame = complete.then(|| core::mem::take(&mut self.buffer));

                if frame.is_none() && (self.corrupt || self.escape) {
                    trace!(
                        "Discarding corrupt frame: {:#04X}",
                        HexSlice::new(&self.buffer)
                    );
                }

                self.reset();
                frame
            }
            SUBSTITUTE => {
                trace!("Received substitute byte. Poisoning frame in progress.");
                self.corrupt = true;
                None
            }
            X_ON => {
                trace!("NCP requested to resume transmission.");
                self.xon = true;
                None
            }
            X_OFF => {
                trace!("NCP requested to pause transmission.");
                self.xon = false;
                None
            }
            ESCAPE if !self.escape => {
                self.escape = true;
                None
            }
            byte => {
                let byte = if self.escape {
                    self.escape = false;
                    byte ^ COMPLEMENT_BIT
                } else {
                    byte
                };

                if self.buffer.push(byte).is_err() {
                    warn!("Frame buffer overflow. Poisoning frame in progress.");
                    self.corrupt = true;
                }

                None
            }
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
