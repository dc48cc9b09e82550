use std::time::Duration;

use serialport::FlowControl;

use crate::BaudRate;

#[cfg(windows)]
pub use serialport::COMPort as SerialPortImpl;

#[cfg(unix)]
pub use serialport::TTYPort as SerialPortImpl;

/// Read timeout of the opened port.
///
/// Expired reads surface as [`std::io::ErrorKind::TimedOut`], which the
/// polling loop treats as an idle cycle.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens a serial port depending on the local operating system.
///
/// # Errors
///
/// For errors please refer to [`serialport::new()`].
pub fn open<'a>(
    path: impl Into<std::borrow::Cow<'a, str>>,
    baud_rate: BaudRate,
    flow_control: FlowControl,
) -> serialport::Result<SerialPortImpl> {
    SerialPortImpl::open(
        &serialport::new(path, baud_rate.into())
            .flow_control(flow_control)
            .timeout(READ_TIMEOUT),
    )
}
