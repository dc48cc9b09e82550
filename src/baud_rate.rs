use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;

/// Available baud rates that the NCP can operate on.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, FromPrimitive, ToPrimitive)]
pub enum BaudRate {
    /// 115200 baud, used with RST/CTS flow control.
    RstCts = 115_200,
    /// 57600 baud, used with XON/XOFF flow control.
    XOnXOff = 57_600,
}

impl From<BaudRate> for u32 {
    fn from(baud_rate: BaudRate) -> Self {
        baud_rate
            .to_u32()
            .expect("Baud rate should always be convertible to u32.")
    }
}
