//! Application-facing driver facade.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Instant;

use log::{debug, warn};
use num_traits::FromPrimitive;

use crate::dongle::{Dongle, Event, Mode, Observer, ObserverHandle};
use crate::error::Error;
use crate::ezsp::{AdapterVersion, FrameId, PROTOCOL_VERSION};

/// All 16 channels of the 2.4 GHz band.
const SCAN_CHANNEL_MASK: u32 = 0x07FF_F800;

/// Energy scan type of the `startScan` command.
const ENERGY_SCAN: u8 = 0x00;

/// Coarse driver state reported to the library state callback.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostState {
    /// The driver has not been started yet.
    Uninitialized,
    /// The reset handshake is running.
    InitInProgress,
    /// The adapter is connected and its version is known.
    Ready,
    /// The adapter could not be initialized or was lost.
    InitFailed,
    /// The bootloader menu prompt has been detected.
    InBootloaderMenu,
    /// The bootloader awaits the XMODEM firmware image.
    InFirmwareTransfer,
}

/// A green-power device paired with the sink.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GpDevice {
    /// The device's green-power source identifier.
    pub source_id: u32,
    /// The device's 128-bit security key.
    pub key: [u8; 16],
}

/// High-level driver for an EZSP adapter.
///
/// Wraps the [`Dongle`] dispatcher with the version handshake and the
/// Zigbee application methods, all of which ride on the command queue.
pub struct Host<T> {
    dongle: Dongle<T>,
    state: HostState,
    state_callback: Option<Box<dyn FnMut(HostState) + Send>>,
    gp_frame_callback: Option<Box<dyn FnMut(&[u8]) + Send>>,
    gp_source_id_callback: Option<Box<dyn FnMut(u32) + Send>>,
    energy_scan_callback: Option<Box<dyn FnMut(u8, i8) + Send>>,
}

impl<T> Host<T> {
    /// Creates a new host driver around the given serial port.
    #[must_use]
    pub fn new(port: T) -> Self {
        Self {
            dongle: Dongle::new(port),
            state: HostState::Uninitialized,
            state_callback: None,
            gp_frame_callback: None,
            gp_source_id_callback: None,
            energy_scan_callback: None,
        }
    }

    /// Returns the current driver state.
    #[must_use]
    pub const fn state(&self) -> HostState {
        self.state
    }

    /// Returns the adapter version data retrieved so far.
    #[must_use]
    pub const fn version(&self) -> &AdapterVersion {
        self.dongle.version()
    }

    /// Falls back to the firmware upgrade instead of the bootloader exit
    /// if the initial reset handshake times out.
    pub fn force_firmware_upgrade_on_init_timeout(&mut self) {
        self.dongle.force_firmware_upgrade_on_init_timeout();
    }

    /// Registers a callback invoked on every driver state change.
    pub fn register_library_state_callback(
        &mut self,
        callback: Box<dyn FnMut(HostState) + Send>,
    ) {
        self.state_callback = Some(callback);
    }

    /// Registers a callback for incoming green-power frames.
    pub fn register_gp_frame_recv_callback(&mut self, callback: Box<dyn FnMut(&[u8]) + Send>) {
        self.gp_frame_callback = Some(callback);
    }

    /// Registers a callback for the source IDs of incoming green-power
    /// frames.
    pub fn register_gp_source_id_callback(&mut self, callback: Box<dyn FnMut(u32) + Send>) {
        self.gp_source_id_callback = Some(callback);
    }

    /// Registers an observer on the underlying dispatcher.
    pub fn register_observer(&mut self, observer: Observer) -> ObserverHandle {
        self.dongle.register_observer(observer)
    }

    /// Removes a previously registered dispatcher observer.
    pub fn unregister_observer(&mut self, handle: ObserverHandle) -> bool {
        self.dongle.unregister_observer(handle)
    }

    fn set_state(&mut self, state: HostState) {
        if self.state == state {
            return;
        }

        debug!("Driver state: {:?} -> {state:?}", self.state);
        self.state = state;

        if let Some(callback) = &mut self.state_callback {
            callback(state);
        }
    }
}

impl<T> Host<T>
where
    T: Write,
{
    /// Starts the driver by initiating the ASH reset handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the `RST` frame cannot be written.
    pub fn start(&mut self) -> Result<(), Error> {
        self.set_state(HostState::InitInProgress);
        self.dongle.start()
    }

    /// Attaches the bootloader prompt parser for a firmware upgrade.
    ///
    /// The NCP must already be rebooting into its bootloader, typically
    /// after a [`FrameId::LaunchStandaloneBootloader`] command sent via
    /// [`send_command`](Self::send_command).
    ///
    /// # Errors
    ///
    /// Returns an error if the mode transition is rejected.
    pub fn set_firmware_upgrade_mode(&mut self) -> Result<(), Error> {
        self.dongle.set_mode(Mode::BootloaderFirmwareUpgrade)
    }

    /// Enqueues an arbitrary EZSP command.
    ///
    /// # Errors
    ///
    /// Returns an error if transmitting the head of the queue fails.
    pub fn send_command(&mut self, frame_id: u8, payload: &[u8]) -> Result<(), Error> {
        self.dongle.send_command(frame_id, payload)
    }

    /// Pairs the given green-power devices with the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if a pairing command cannot be enqueued.
    pub fn add_gp_devices(&mut self, devices: &[GpDevice]) -> Result<(), Error> {
        for device in devices {
            let mut payload = Vec::with_capacity(20);
            payload.extend_from_slice(&device.source_id.to_le_bytes());
            payload.extend_from_slice(&device.key);
            self.dongle
                .send_command(FrameId::GpProxyTableProcessGpPairing.into(), &payload)?;
        }

        Ok(())
    }

    /// Removes the green-power devices with the given source IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if a removal command cannot be enqueued.
    pub fn remove_gp_devices(&mut self, source_ids: &[u32]) -> Result<(), Error> {
        for source_id in source_ids {
            self.dongle.send_command(
                FrameId::GpSinkTableRemoveEntry.into(),
                &source_id.to_le_bytes(),
            )?;
        }

        Ok(())
    }

    /// Removes all paired green-power devices.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be enqueued.
    pub fn clear_all_gp_devices(&mut self) -> Result<(), Error> {
        self.dongle
            .send_command(FrameId::GpSinkTableClearAll.into(), &[])
    }

    /// Opens a green-power commissioning session.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be enqueued.
    pub fn open_commissioning_session(&mut self) -> Result<(), Error> {
        self.dongle.send_command(FrameId::DGpSend.into(), &[0x01])
    }

    /// Closes the green-power commissioning session.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be enqueued.
    pub fn close_commissioning_session(&mut self) -> Result<(), Error> {
        self.dongle.send_command(FrameId::DGpSend.into(), &[0x00])
    }

    /// Starts an energy scan over all channels.
    ///
    /// The callback is invoked once per channel with the measured
    /// maximum RSSI.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan command cannot be enqueued.
    pub fn start_energy_scan(
        &mut self,
        callback: Box<dyn FnMut(u8, i8) + Send>,
        duration: u8,
    ) -> Result<(), Error> {
        self.energy_scan_callback = Some(callback);

        let mut payload = vec![ENERGY_SCAN];
        payload.extend_from_slice(&SCAN_CHANNEL_MASK.to_le_bytes());
        payload.push(duration);
        self.dongle
            .send_command(FrameId::StartScan.into(), &payload)
    }

    /// Sets the radio channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChannel`] for channels outside 11..=26,
    /// or an error if the command cannot be enqueued.
    pub fn set_channel(&mut self, channel: u8) -> Result<(), Error> {
        if !(11..=26).contains(&channel) {
            return Err(Error::InvalidChannel(channel));
        }

        self.dongle
            .send_command(FrameId::SetRadioChannel.into(), &[channel])
    }

    /// Feeds received serial bytes through the dispatcher and processes
    /// the resulting events.
    ///
    /// # Errors
    ///
    /// Returns an error if a reply cannot be written.
    pub fn handle_incoming(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let events = self.dongle.handle_incoming(bytes)?;
        self.process_events(events)
    }

    /// Advances the dispatcher's ACK timer.
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout fallback cannot be initiated.
    pub fn tick(&mut self, now: Instant) -> Result<(), Error> {
        let events = self.dongle.tick(now)?;
        self.process_events(events)
    }

    fn process_events(&mut self, events: Vec<Event>) -> Result<(), Error> {
        let mut queue: VecDeque<Event> = events.into();

        while let Some(event) = queue.pop_front() {
            match &event {
                Event::Ready => {
                    // First command after every (re)connect: negotiate
                    // the EZSP protocol version.
                    self.dongle
                        .send_command(FrameId::Version.into(), &[PROTOCOL_VERSION])?;
                }
                Event::VersionRetrieved(version) => {
                    debug!("Adapter version: {version}");
                    self.set_state(HostState::Ready);
                }
                Event::Removed | Event::NotResponding => {
                    self.set_state(HostState::InitFailed);
                }
                Event::BootloaderPrompt => {
                    self.set_state(HostState::InBootloaderMenu);
                }
                Event::FirmwareTransferReady => {
                    self.set_state(HostState::InFirmwareTransfer);
                }
                Event::Message { frame_id, payload } => {
                    queue.extend(self.handle_message(*frame_id, payload));
                }
            }
        }

        Ok(())
    }

    fn handle_message(&mut self, frame_id: u8, payload: &[u8]) -> Vec<Event> {
        match FrameId::from_u8(frame_id) {
            Some(FrameId::Version) => {
                // [stack version low, stack version high, protocol
                // version, stack type]
                if payload.len() >= 4 {
                    let stack_version = u16::from_le_bytes([payload[0], payload[1]]);
                    return self.dongle.set_fetched_ezsp_version(
                        stack_version,
                        payload[2],
                        payload[3],
                    );
                }

                warn!("Truncated version response: {} bytes.", payload.len());
            }
            Some(FrameId::GetXncpInfo) => {
                // [status, manufacturer ID, version number]
                if payload.len() >= 5 && payload[0] == 0 {
                    let manufacturer_id = u16::from_le_bytes([payload[1], payload[2]]);
                    let version_number = u16::from_le_bytes([payload[3], payload[4]]);
                    return self
                        .dongle
                        .set_fetched_xncp_data(manufacturer_id, version_number);
                }
            }
            Some(FrameId::EnergyScanResultHandler) => {
                // [channel, maximum RSSI]
                if payload.len() >= 2 {
                    if let Some(callback) = &mut self.energy_scan_callback {
                        #[allow(clippy::cast_possible_wrap)]
                        callback(payload[0], payload[1] as i8);
                    }
                }
            }
            Some(FrameId::ScanCompleteHandler) => {
                debug!("Scan complete.");
                self.energy_scan_callback = None;
            }
            Some(FrameId::GpepIncomingMessageHandler) => {
                if let Some(callback) = &mut self.gp_frame_callback {
                    callback(payload);
                }

                // The green-power source ID sits behind status, link
                // quality, sequence number and address type.
                if payload.len() >= 8 {
                    if let Some(callback) = &mut self.gp_source_id_callback {
                        callback(u32::from_le_bytes([
                            payload[4], payload[5], payload[6], payload[7],
                        ]));
                    }
                }
            }
            _ => {}
        }

        Vec::new()
    }
}

impl<T> Host<T>
where
    T: Read + Write,
{
    /// Polls the serial port once: reads available bytes, advances the
    /// timer and processes all resulting events.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failures other than a read timeout.
    pub fn poll(&mut self) -> Result<(), Error> {
        let events = self.dongle.poll()?;
        self.process_events(events)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    use super::{Host, HostState};
    use crate::ezsp::FrameId;

    const RST_ACK_WIRE: [u8; 6] = [0xC1, 0x02, 0x02, 0x9B, 0x7B, 0x7E];

    #[test]
    fn test_start_reports_init_in_progress() {
        let mut host = Host::new(Vec::new());
        assert_eq!(host.state(), HostState::Uninitialized);
        host.start().unwrap();
        assert_eq!(host.state(), HostState::InitInProgress);
    }

    #[test]
    fn test_connect_triggers_version_handshake() {
        let mut host = Host::new(Vec::new());
        host.start().unwrap();
        host.handle_incoming(&RST_ACK_WIRE).unwrap();

        // The port now holds the RST frame followed by the version
        // command's DATA frame.
        let port = host.dongle.into_port();
        assert!(port.len() > 5);
        assert_eq!(port[..5], [0x1A, 0xC0, 0x38, 0xBC, 0x7E]);
        // DATA frames have the high control bit cleared.
        assert_eq!(port[5] & 0x80, 0x00);
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let mut host = Host::new(Vec::new());
        assert!(host.set_channel(10).is_err());
        assert!(host.set_channel(27).is_err());
    }

    #[test]
    fn test_state_callback_invoked() {
        let states = Arc::new(AtomicU8::new(0));
        let observed = Arc::clone(&states);

        let mut host = Host::new(Vec::new());
        host.register_library_state_callback(Box::new(move |_| {
            observed.fetch_add(1, Ordering::Relaxed);
        }));

        host.start().unwrap();
        assert_eq!(states.load(Ordering::Relaxed), 1);

        host.handle_incoming(&RST_ACK_WIRE).unwrap();
        // Ready is only reported once the version has been retrieved.
        assert_eq!(host.state(), HostState::InitInProgress);
    }

    #[test]
    fn test_version_response_completes_startup() {
        let mut host = Host::new(Vec::new());
        host.start().unwrap();
        host.handle_incoming(&RST_ACK_WIRE).unwrap();

        // NCP response to the version command.
        let mut ncp = crate::codec::AshCodec::new();
        ncp.forge_reset_frame().unwrap();
        ncp.append_incoming(&RST_ACK_WIRE);
        let response = ncp
            .forge_data_frame(&[0x00, 0x80, 0x00, 0x03, 0x6A, 0x08, 0x02])
            .unwrap();

        host.handle_incoming(&response).unwrap();
        assert_eq!(host.state(), HostState::Ready);
        assert_eq!(host.version().stack_version, Some(0x6A03));
        assert_eq!(host.version().protocol_version, Some(0x08));
        assert_eq!(host.version().stack_type, Some(0x02));
    }

    #[test]
    fn test_gp_callbacks() {
        let source_ids = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observed = Arc::clone(&source_ids);

        let mut host = Host::new(Vec::new());
        host.register_gp_source_id_callback(Box::new(move |source_id| {
            observed.lock().unwrap().push(source_id);
        }));

        host.start().unwrap();
        host.handle_incoming(&RST_ACK_WIRE).unwrap();

        let mut ncp = crate::codec::AshCodec::new();
        ncp.forge_reset_frame().unwrap();
        ncp.append_incoming(&RST_ACK_WIRE);
        let gp_frame = ncp
            .forge_data_frame(&[
                0x01,
                0x90,
                u8::from(FrameId::GpepIncomingMessageHandler),
                0x00,
                0xC5,
                0x07,
                0x00,
                0x78,
                0x56,
                0x34,
                0x12,
            ])
            .unwrap();

        host.handle_incoming(&gp_frame).unwrap();
        assert_eq!(source_ids.lock().unwrap().as_slice(), &[0x1234_5678]);
    }
}
