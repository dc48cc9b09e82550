pub use randomization::{Mask, Masker};
pub use stuffing::{Stuff, Stuffer, Unstuff, Unstuffer};

mod randomization;
mod stuffing;

/// Flag byte terminating a frame.
pub const FLAG: u8 = 0x7E;

/// Escape byte prefixing a stuffed reserved byte.
pub const ESCAPE: u8 = 0x7D;

/// XON byte to resume transmission.
pub const X_ON: u8 = 0x11;

/// XOFF byte to pause transmission.
pub const X_OFF: u8 = 0x13;

/// Substitute byte marking the frame in progress as corrupt.
pub const SUBSTITUTE: u8 = 0x18;

/// Cancel byte discarding the frame in progress.
pub const CANCEL: u8 = 0x1A;

/// Bytes that must not appear verbatim inside a frame body.
pub const RESERVED_BYTES: [u8; 6] = [FLAG, ESCAPE, X_ON, X_OFF, SUBSTITUTE, CANCEL];

/// Bit toggled to escape and unescape a reserved byte.
pub const COMPLEMENT_BIT: u8 = 1 << 5;
