//! Command queue, adapter-mode state machine and observer dispatch.

use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::time::Instant;

use log::{debug, error, trace, warn};

use crate::bootloader::{PromptEvent, PromptParser};
use crate::codec::AshEvent;
use crate::driver::AshDriver;
use crate::error::Error;
use crate::ezsp::{
    AdapterVersion, FrameId, COMMAND_FRAME_CONTROL, FRAME_ID_INDEX, HEADER_SIZE,
};
use crate::hex_slice::HexSlice;

/// Physical mode of the serial link.
///
/// The mode decides which decoder the incoming byte stream is attached to:
/// the ASH driver in [`EzspNcp`](Self::EzspNcp) and [`Unknown`](Self::Unknown),
/// the bootloader prompt parser in the two bootloader modes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    /// The link state has not been probed yet.
    #[default]
    Unknown,
    /// The NCP runs its application image and speaks EZSP over ASH.
    EzspNcp,
    /// The bootloader prompt is attached in order to exit back to EZSP.
    BootloaderExitToEzspNcp,
    /// The bootloader prompt is attached for a firmware upgrade.
    BootloaderFirmwareUpgrade,
}

/// Notifications delivered to observers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// The ASH connection is established; the adapter accepts commands.
    Ready,
    /// The NCP reported a fatal condition; the adapter is unusable.
    Removed,
    /// The adapter did not answer the reset handshake.
    NotResponding,
    /// Adapter version data has been retrieved.
    VersionRetrieved(AdapterVersion),
    /// The bootloader menu prompt was detected.
    BootloaderPrompt,
    /// The bootloader awaits the XMODEM firmware transfer.
    FirmwareTransferReady,
    /// An EZSP frame was received; `payload` excludes the EZSP header.
    Message { frame_id: u8, payload: Vec<u8> },
}

/// Observer callback invoked for every emitted [`Event`].
pub type Observer = Box<dyn FnMut(&Event) + Send>;

/// Handle identifying a registered observer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ObserverHandle(u64);

#[derive(Clone, Debug, Eq, PartialEq)]
struct OutgoingMessage {
    frame_id: u8,
    payload: Vec<u8>,
}

/// The EZSP dispatcher.
///
/// Owns the serial port, the outgoing command queue, the adapter-mode
/// state machine and the observer registry. At most one `DATA` frame is
/// in flight: the next queued command is transmitted only once the
/// response to the previous one has been received.
pub struct Dongle<T> {
    port: T,
    driver: AshDriver,
    prompt: PromptParser,
    mode: Mode,
    queue: VecDeque<OutgoingMessage>,
    waiting_for_response: bool,
    sequence: u8,
    first_startup: bool,
    upgrade_on_init_timeout: bool,
    version: AdapterVersion,
    observers: HashMap<u64, Observer>,
    next_observer_id: u64,
}

impl<T> Dongle<T> {
    /// Creates a new dispatcher around the given serial port.
    #[must_use]
    pub fn new(port: T) -> Self {
        Self {
            port,
            driver: AshDriver::new(),
            prompt: PromptParser::new(),
            mode: Mode::Unknown,
            queue: VecDeque::new(),
            waiting_for_response: false,
            sequence: 0,
            first_startup: true,
            upgrade_on_init_timeout: false,
            version: AdapterVersion::default(),
            observers: HashMap::new(),
            next_observer_id: 0,
        }
    }

    /// Returns the current adapter mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the adapter version data retrieved so far.
    #[must_use]
    pub const fn version(&self) -> &AdapterVersion {
        &self.version
    }

    /// Returns the serial port, consuming the dispatcher.
    pub fn into_port(self) -> T {
        self.port
    }

    /// Falls back to the firmware-upgrade mode instead of the bootloader
    /// exit if the initial reset handshake times out.
    pub fn force_firmware_upgrade_on_init_timeout(&mut self) {
        self.upgrade_on_init_timeout = true;
    }

    /// Registers an observer for all emitted events.
    pub fn register_observer(&mut self, observer: Observer) -> ObserverHandle {
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        self.observers.insert(id, observer);
        ObserverHandle(id)
    }

    /// Removes a previously registered observer.
    ///
    /// Returns whether the handle was registered.
    pub fn unregister_observer(&mut self, handle: ObserverHandle) -> bool {
        self.observers.remove(&handle.0).is_some()
    }

    fn notify(&mut self, event: Event, out: &mut Vec<Event>) {
        for observer in self.observers.values_mut() {
            observer(&event);
        }

        out.push(event);
    }
}

impl<T> Dongle<T>
where
    T: Write,
{
    /// Starts (or restarts) the ASH reset handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the `RST` frame cannot be written.
    pub fn start(&mut self) -> Result<(), Error> {
        debug!("Starting ASH reset handshake.");
        self.driver.send_reset(&mut self.port)
    }

    /// Enqueues an EZSP command and drives the send pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if transmitting the head of the queue fails.
    pub fn send_command(&mut self, frame_id: u8, payload: &[u8]) -> Result<(), Error> {
        self.queue.push_back(OutgoingMessage {
            frame_id,
            payload: payload.to_vec(),
        });
        self.send_next_message()
    }

    /// Requests an adapter-mode transition.
    ///
    /// Only two transitions exist: out of the bootloader back to EZSP,
    /// and from EZSP (or an unprobed link) into the firmware upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedModeTransition`] for any other
    /// combination, or an I/O error if the bootloader nudge fails.
    pub fn set_mode(&mut self, requested: Mode) -> Result<(), Error> {
        if self.mode != Mode::EzspNcp
            && matches!(
                requested,
                Mode::EzspNcp | Mode::BootloaderExitToEzspNcp
            )
        {
            debug!("Attaching bootloader prompt parser to exit to EZSP.");
            self.mode = Mode::BootloaderExitToEzspNcp;
            self.prompt.reset();
            return self.nudge_bootloader();
        }

        if matches!(self.mode, Mode::EzspNcp | Mode::Unknown)
            && requested == Mode::BootloaderFirmwareUpgrade
        {
            debug!("Attaching bootloader prompt parser for a firmware upgrade.");
            self.mode = Mode::BootloaderFirmwareUpgrade;
            self.prompt.reset();
            return self.nudge_bootloader();
        }

        Err(Error::UnsupportedModeTransition {
            current: self.mode,
            requested,
        })
    }

    /// Handles a burst of bytes received from the serial port,
    /// feeding whichever decoder the current mode attaches.
    ///
    /// Returns the events produced, after observers have been notified.
    ///
    /// # Errors
    ///
    /// Returns an error if a reply frame or menu key cannot be written.
    pub fn handle_incoming(&mut self, bytes: &[u8]) -> Result<Vec<Event>, Error> {
        trace!("Received {:#04X}", HexSlice::new(bytes));
        let mut out = Vec::new();

        match self.mode {
            Mode::EzspNcp | Mode::Unknown => {
                let events = self.driver.receive(&mut self.port, bytes)?;

                for event in events {
                    self.handle_ash_event(event, &mut out)?;
                }
            }
            Mode::BootloaderExitToEzspNcp | Mode::BootloaderFirmwareUpgrade => {
                let events = self.prompt.receive(bytes);

                for event in events {
                    self.handle_prompt_event(event, &mut out)?;
                }
            }
        }

        Ok(out)
    }

    /// Advances the ACK timer.
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout fallback cannot be initiated.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<Event>, Error> {
        let mut out = Vec::new();

        if let Some(event) = self.driver.tick(now) {
            self.handle_ash_event(event, &mut out)?;
        }

        Ok(out)
    }

    /// Records version data retrieved via the EZSP version handshake.
    pub fn set_fetched_ezsp_version(
        &mut self,
        stack_version: u16,
        protocol_version: u8,
        stack_type: u8,
    ) -> Vec<Event> {
        self.version
            .set_ezsp_version_info(stack_version, protocol_version, stack_type);
        let mut out = Vec::new();
        self.notify(Event::VersionRetrieved(self.version.clone()), &mut out);
        out
    }

    /// Records XNCP data retrieved from the NCP.
    pub fn set_fetched_xncp_data(
        &mut self,
        manufacturer_id: u16,
        version_number: u16,
    ) -> Vec<Event> {
        self.version.set_xncp_data(manufacturer_id, version_number);
        let mut out = Vec::new();
        self.notify(Event::VersionRetrieved(self.version.clone()), &mut out);
        out
    }

    fn handle_ash_event(&mut self, event: AshEvent, out: &mut Vec<Event>) -> Result<(), Error> {
        match event {
            AshEvent::Connected => {
                // The dongle is now known to communicate over ASH.
                self.mode = Mode::EzspNcp;
                self.notify(Event::Ready, out);
            }
            AshEvent::Disconnected => {
                self.notify(Event::Removed, out);
            }
            AshEvent::NakReceived => {
                warn!("Caught an ASH NAK from NCP; resending.");
                self.waiting_for_response = false;
                self.send_next_message()?;
            }
            AshEvent::ResetFailed => {
                if self.first_startup {
                    // The adapter may be sitting in its bootloader rather
                    // than speaking ASH; probe the prompt.
                    self.first_startup = false;

                    let fallback = if self.upgrade_on_init_timeout {
                        Mode::BootloaderFirmwareUpgrade
                    } else {
                        Mode::BootloaderExitToEzspNcp
                    };

                    self.set_mode(fallback)?;
                } else {
                    error!("EZSP adapter is not responding.");
                    self.notify(Event::NotResponding, out);
                }
            }
            AshEvent::Received(payload) => {
                self.handle_ezsp_frame(&payload, out)?;
            }
            AshEvent::AckCleared | AshEvent::Rejected => {}
        }

        Ok(())
    }

    fn handle_ezsp_frame(&mut self, payload: &[u8], out: &mut Vec<Event>) -> Result<(), Error> {
        if !matches!(self.mode, Mode::EzspNcp | Mode::Unknown) {
            error!("EZSP frame received while in bootloader prompt mode.");
            return Ok(());
        }

        if payload.len() < HEADER_SIZE {
            warn!(
                "Discarding truncated EZSP frame: {:#04X}",
                HexSlice::new(payload)
            );
            return Ok(());
        }

        let frame_id = payload[FRAME_ID_INDEX];
        let body = payload[HEADER_SIZE..].to_vec();

        // The bootloader launch response must not be followed by any
        // further serial traffic: the NCP reboots immediately.
        if frame_id == u8::from(FrameId::LaunchStandaloneBootloader) {
            debug!("Suppressing ACK after bootloader launch response.");
        } else {
            self.driver.send_ack(&mut self.port)?;
            self.handle_response(frame_id)?;
        }

        self.notify(
            Event::Message {
                frame_id,
                payload: body,
            },
            out,
        );
        Ok(())
    }

    fn handle_response(&mut self, frame_id: u8) -> Result<(), Error> {
        if self.queue.is_empty() {
            return Ok(());
        }

        if !self.waiting_for_response {
            error!("Received a response while none was expected.");
        }

        if self
            .queue
            .front()
            .is_some_and(|message| message.frame_id == frame_id)
        {
            self.queue.pop_front();
            self.waiting_for_response = false;
            self.send_next_message()?;
        } else {
            warn!("Asynchronous EZSP message received: {frame_id:#04X}");
        }

        Ok(())
    }

    fn send_next_message(&mut self) -> Result<(), Error> {
        if !matches!(self.mode, Mode::EzspNcp | Mode::Unknown) {
            warn!("Refusing to send EZSP messages in bootloader mode.");
            return Ok(());
        }

        if self.waiting_for_response {
            return Ok(());
        }

        let Some(message) = self.queue.front() else {
            return Ok(());
        };

        let mut frame = Vec::with_capacity(HEADER_SIZE + message.payload.len());
        frame.push(self.sequence);
        frame.push(COMMAND_FRAME_CONTROL);
        frame.push(message.frame_id);
        frame.extend_from_slice(&message.payload);

        self.driver.send_data(&mut self.port, &frame)?;
        self.sequence = self.sequence.wrapping_add(1);
        self.waiting_for_response = true;
        Ok(())
    }

    fn handle_prompt_event(
        &mut self,
        event: PromptEvent,
        out: &mut Vec<Event>,
    ) -> Result<(), Error> {
        match event {
            PromptEvent::PromptDetected => {
                self.notify(Event::BootloaderPrompt, out);

                match self.mode {
                    Mode::BootloaderExitToEzspNcp => {
                        self.prompt.select_mode_run(&mut self.port)?;
                        self.mode = Mode::EzspNcp;
                        self.start()?;
                    }
                    Mode::BootloaderFirmwareUpgrade => {
                        self.prompt.select_mode_upgrade_fw(&mut self.port)?;
                    }
                    Mode::Unknown | Mode::EzspNcp => {
                        warn!("Bootloader prompt detected outside a bootloader mode.");
                    }
                }
            }
            PromptEvent::TransferReady => {
                self.notify(Event::FirmwareTransferReady, out);
            }
        }

        Ok(())
    }

    /// Writes a carriage return so an idle bootloader re-prints its menu.
    fn nudge_bootloader(&mut self) -> Result<(), Error> {
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        Ok(())
    }
}

impl<T> Dongle<T>
where
    T: Read + Write,
{
    /// Reads available bytes from the serial port and advances the timer.
    ///
    /// Read timeouts are treated as an idle poll, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error on any other I/O failure.
    pub fn poll(&mut self) -> Result<Vec<Event>, Error> {
        let mut buffer = [0u8; 256];
        let mut out = Vec::new();

        match self.port.read(&mut buffer) {
            Ok(count) if count > 0 => out.extend(self.handle_incoming(&buffer[..count])?),
            Ok(_) => {}
            Err(error)
                if matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
            Err(error) => return Err(error.into()),
        }

        out.extend(self.tick(Instant::now())?);
        Ok(out)
    }
}
