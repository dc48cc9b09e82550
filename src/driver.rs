//! Coupling of the ASH codec to the serial writer and the ACK timer.

use std::io::Write;
use std::time::{Duration, Instant};

use log::{debug, error, trace};

use crate::codec::{AshCodec, AshEvent};
use crate::error::Error;
use crate::status::Status;

/// Minimum receive-ACK timeout of the adaptive band.
pub const T_RX_ACK_MIN: Duration = Duration::from_millis(400);

/// Initial receive-ACK timeout.
///
/// The adaptive band between [`T_RX_ACK_MIN`] and [`T_RX_ACK_MAX`] is
/// defined by UG101; this driver operates at the initial point only.
pub const T_RX_ACK_INIT: Duration = Duration::from_millis(1600);

/// Maximum receive-ACK timeout of the adaptive band.
pub const T_RX_ACK_MAX: Duration = Duration::from_millis(3200);

/// Timeout for the `RSTACK` reply to a `RST` frame.
pub const T_ACK_ASH_RESET: Duration = Duration::from_millis(5000);

/// The single-shot timeout guarding the outstanding frame.
///
/// Stopping an already expired or never started timer is a no-op,
/// so a cancellation racing the expiry is harmless.
#[derive(Debug, Default)]
struct AckTimer {
    deadline: Option<Instant>,
}

impl AckTimer {
    fn start(&mut self, now: Instant, timeout: Duration) {
        self.deadline = Some(now + timeout);
    }

    fn stop(&mut self) {
        self.deadline = None;
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// Frame-level driver: forges frames via the codec, writes them to the
/// serial port and arms the ACK timer around outstanding frames.
#[derive(Debug)]
pub struct AshDriver {
    codec: AshCodec,
    timer: AckTimer,
}

impl AshDriver {
    /// Creates a new driver with a disconnected codec and an idle timer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codec: AshCodec::new(),
            timer: AckTimer::default(),
        }
    }

    /// Returns the codec's session status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.codec.status()
    }

    /// Determines whether the ASH session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.codec.is_connected()
    }

    /// Sends a `RST` frame and arms the reset timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be forged or written.
    pub fn send_reset<W: Write>(&mut self, port: &mut W) -> Result<(), Error> {
        self.timer.stop();
        let frame = self.codec.forge_reset_frame()?;
        write_frame(port, &frame)?;
        debug!("Sent RST; awaiting RSTACK.");
        self.timer.start(Instant::now(), T_ACK_ASH_RESET);
        Ok(())
    }

    /// Sends an `ACK` frame for the last accepted `DATA` frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be forged or written.
    pub fn send_ack<W: Write>(&mut self, port: &mut W) -> Result<(), Error> {
        self.timer.stop();
        let frame = self.codec.forge_ack_frame()?;
        write_frame(port, &frame)
    }

    /// Sends a `DATA` frame and arms the ACK timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is established or the frame
    /// cannot be forged or written.
    pub fn send_data<W: Write>(&mut self, port: &mut W, payload: &[u8]) -> Result<(), Error> {
        self.timer.stop();
        let frame = self.codec.forge_data_frame(payload)?;
        write_frame(port, &frame)?;
        self.timer.start(Instant::now(), T_RX_ACK_INIT);
        Ok(())
    }

    /// Decodes received bytes, stopping the timer on acknowledgements
    /// and answering rejected frames with a `NAK`.
    ///
    /// # Errors
    ///
    /// Returns an error if a `NAK` reply cannot be written.
    pub fn receive<W: Write>(
        &mut self,
        port: &mut W,
        bytes: &[u8],
    ) -> Result<Vec<AshEvent>, Error> {
        let events = self.codec.append_incoming(bytes);

        for event in &events {
            match event {
                AshEvent::AckCleared => {
                    trace!("Outstanding frame acknowledged. Stopping ACK timer.");
                    self.timer.stop();
                }
                AshEvent::Rejected => {
                    let nak = self.codec.forge_nak_frame()?;
                    write_frame(port, &nak)?;
                }
                _ => {}
            }
        }

        Ok(events)
    }

    /// Advances the ACK timer.
    ///
    /// While the reset handshake is pending, an expiry surfaces as
    /// [`AshEvent::ResetFailed`]. While connected, an expiry is only
    /// logged; no retransmission is attempted.
    pub fn tick(&mut self, now: Instant) -> Option<AshEvent> {
        if !self.timer.is_expired(now) {
            return None;
        }

        self.timer.stop();

        if self.codec.is_connected() {
            error!("ACK timeout while connected.");
            None
        } else {
            self.codec.reset_timed_out();
            Some(AshEvent::ResetFailed)
        }
    }
}

impl Default for AshDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn write_frame<W: Write>(port: &mut W, frame: &[u8]) -> Result<(), Error> {
    port.write_all(frame)?;
    port.flush()?;
    Ok(())
}
