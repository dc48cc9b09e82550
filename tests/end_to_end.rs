//! End-to-end scenarios against a scripted NCP.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ezsp_host::{
    ApsOptions, Dongle, Event, FrameId, Host, HostState, Mode, T_ACK_ASH_RESET,
};

/// Independent ASH frame builder mirroring the NCP side of the link.
///
/// Implements CRC, masking and stuffing from the UG101 definitions so the
/// driver is checked against the wire format, not against itself.
mod ncp {
    const FLAG: u8 = 0x7E;
    const ESCAPE: u8 = 0x7D;
    const RESERVED: [u8; 6] = [0x7E, 0x7D, 0x11, 0x13, 0x18, 0x1A];

    pub fn crc16(bytes: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;

        for &byte in bytes {
            crc ^= u16::from(byte) << 8;

            for _ in 0..8 {
                crc = if crc & 0x8000 == 0 {
                    crc << 1
                } else {
                    (crc << 1) ^ 0x1021
                };
            }
        }

        crc
    }

    pub fn mask(bytes: &[u8]) -> Vec<u8> {
        let mut random: u8 = 0x42;
        let mut masked = Vec::with_capacity(bytes.len());

        for &byte in bytes {
            masked.push(byte ^ random);
            random = if random & 0x01 == 0 {
                random >> 1
            } else {
                (random >> 1) ^ 0xB8
            };
        }

        masked
    }

    fn frame(body: Vec<u8>) -> Vec<u8> {
        let crc = crc16(&body);
        let mut framed = body;
        framed.extend_from_slice(&crc.to_be_bytes());

        let mut wire = Vec::with_capacity(framed.len() * 2 + 1);

        for byte in framed {
            if RESERVED.contains(&byte) {
                wire.push(ESCAPE);
                wire.push(byte ^ 0x20);
            } else {
                wire.push(byte);
            }
        }

        wire.push(FLAG);
        wire
    }

    /// An `RSTACK` frame reporting a power-on reset.
    pub fn rst_ack() -> Vec<u8> {
        frame(vec![0xC1, 0x02, 0x02])
    }

    /// A `DATA` frame carrying the given EZSP frame.
    pub fn data(frame_num: u8, ack_num: u8, ezsp_frame: &[u8]) -> Vec<u8> {
        let mut body = vec![(frame_num << 4) | (ack_num & 0x07)];
        body.extend_from_slice(&mask(ezsp_frame));
        frame(body)
    }

    /// A `NAK` frame naming the still-expected frame number.
    pub fn nak(ack_num: u8) -> Vec<u8> {
        frame(vec![0xA0 | (ack_num & 0x07)])
    }

    /// An `ERROR` frame with the given error code.
    pub fn error(code: u8) -> Vec<u8> {
        frame(vec![0xC2, 0x02, code])
    }
}

/// A writable port whose output remains inspectable from the test.
#[derive(Clone, Default)]
struct SharedPort(Rc<RefCell<Vec<u8>>>);

impl SharedPort {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.borrow_mut())
    }
}

impl Write for SharedPort {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buffer);
        Ok(buffer.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A scripted serial port for driving [`Host::poll`].
#[derive(Clone, Default)]
struct ScriptedPort {
    inner: Rc<RefCell<ScriptedPortInner>>,
}

#[derive(Default)]
struct ScriptedPortInner {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl ScriptedPort {
    fn push_rx(&self, bytes: &[u8]) {
        self.inner.borrow_mut().rx.extend(bytes);
    }

    fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().tx)
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();

        if inner.rx.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let mut count = 0;

        while count < buffer.len() {
            match inner.rx.pop_front() {
                Some(byte) => {
                    buffer[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }

        Ok(count)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.inner.borrow_mut().tx.extend_from_slice(buffer);
        Ok(buffer.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn recording_observer(events: &Arc<Mutex<Vec<Event>>>) -> ezsp_host::Observer {
    let events = Arc::clone(events);
    Box::new(move |event| events.lock().unwrap().push(event.clone()))
}

fn connect(dongle: &mut Dongle<SharedPort>, port: &SharedPort) {
    dongle.start().expect("RST should be written");
    let events = dongle.handle_incoming(&ncp::rst_ack()).unwrap();
    assert_eq!(events, vec![Event::Ready]);
    port.take();
}

#[test]
fn startup_happy_path() {
    let port = SharedPort::default();
    let mut dongle = Dongle::new(port.clone());

    let observed = Arc::new(Mutex::new(Vec::new()));
    dongle.register_observer(recording_observer(&observed));

    dongle.start().unwrap();
    assert_eq!(port.take(), vec![0x1A, 0xC0, 0x38, 0xBC, 0x7E]);

    let events = dongle.handle_incoming(&ncp::rst_ack()).unwrap();
    assert_eq!(events, vec![Event::Ready]);
    assert_eq!(*observed.lock().unwrap(), vec![Event::Ready]);
    assert_eq!(dongle.mode(), Mode::EzspNcp);
}

#[test]
fn version_retrieved() {
    let port = SharedPort::default();
    let mut dongle = Dongle::new(port.clone());

    let observed = Arc::new(Mutex::new(Vec::new()));
    dongle.register_observer(recording_observer(&observed));
    connect(&mut dongle, &port);
    observed.lock().unwrap().clear();

    dongle.send_command(FrameId::Version.into(), &[0x08]).unwrap();

    // The command left as a DATA frame with frame number 0 carrying
    // [sequence, frame control, frame ID, payload].
    let sent = port.take();
    assert_eq!(sent[0] & 0xF0, 0x00);
    assert_eq!(
        ncp::mask(&sent[1..sent.len() - 3]),
        vec![0x00, 0x00, 0x00, 0x08]
    );

    // The NCP responds with the stack version 6.10.3.0, protocol 8,
    // stack type 2.
    let response = ncp::data(0, 1, &[0x00, 0x80, 0x00, 0x30, 0x6A, 0x08, 0x02]);
    let events = dongle.handle_incoming(&response).unwrap();

    assert_eq!(
        events,
        vec![Event::Message {
            frame_id: 0x00,
            payload: vec![0x30, 0x6A, 0x08, 0x02],
        }]
    );

    // The receipt was acknowledged with ACK(1).
    let replies = port.take();
    assert_eq!(replies[0], 0x81);

    // A follow-up command is transmitted immediately: the queue was
    // popped and the send window is free again.
    dongle.send_command(FrameId::GetXncpInfo.into(), &[]).unwrap();
    assert!(!port.take().is_empty());
}

#[test]
fn nak_drives_resend_with_new_frame_number() {
    let port = SharedPort::default();
    let mut dongle = Dongle::new(port.clone());
    connect(&mut dongle, &port);

    dongle.send_command(FrameId::Version.into(), &[0x08]).unwrap();
    let first = port.take();
    assert_eq!(first[0] & 0x70, 0x00);

    dongle.handle_incoming(&ncp::nak(0)).unwrap();

    // The same command was re-sent with the next frame number.
    let resent = port.take();
    assert_eq!(resent[0] & 0x70, 0x10);
    assert_eq!(
        ncp::mask(&resent[1..resent.len() - 3])[2..],
        ncp::mask(&first[1..first.len() - 3])[2..]
    );
}

#[test]
fn reset_timeout_falls_back_to_bootloader_exit() {
    let port = SharedPort::default();
    let mut dongle = Dongle::new(port.clone());

    dongle.start().unwrap();
    port.take();

    let late = Instant::now() + T_ACK_ASH_RESET + Duration::from_millis(1);
    dongle.tick(late).unwrap();
    assert_eq!(dongle.mode(), Mode::BootloaderExitToEzspNcp);
    port.take();

    let events = dongle
        .handle_incoming(b"\r\nGecko Bootloader v1.9.1\r\n1. upload gbl\r\n2. run\r\nBL > ")
        .unwrap();
    assert_eq!(events, vec![Event::BootloaderPrompt]);
    assert_eq!(dongle.mode(), Mode::EzspNcp);

    // The "run" selection followed by a fresh RST.
    let written = port.take();
    assert_eq!(written[0], b'2');
    assert_eq!(&written[1..], &[0x1A, 0xC0, 0x38, 0xBC, 0x7E]);
}

#[test]
fn bootloader_launch_suppresses_all_following_traffic() {
    let port = SharedPort::default();
    let mut dongle = Dongle::new(port.clone());
    connect(&mut dongle, &port);

    dongle
        .send_command(FrameId::LaunchStandaloneBootloader.into(), &[0x01])
        .unwrap();
    port.take();

    let response = ncp::data(0, 1, &[0x00, 0x80, 0x8F, 0x00]);
    let events = dongle.handle_incoming(&response).unwrap();

    assert_eq!(
        events,
        vec![Event::Message {
            frame_id: 0x8F,
            payload: vec![0x00],
        }]
    );

    // No ACK was written and the queue was not drained: a further
    // command stays queued behind the bootloader launch.
    assert!(port.take().is_empty());
    dongle.send_command(FrameId::Version.into(), &[0x08]).unwrap();
    assert!(port.take().is_empty());
}

#[test]
fn error_frame_reports_removal() {
    let port = SharedPort::default();
    let mut dongle = Dongle::new(port.clone());
    connect(&mut dongle, &port);

    let events = dongle.handle_incoming(&ncp::error(0x51)).unwrap();
    assert_eq!(events, vec![Event::Removed]);
}

#[test]
fn aps_options_round_trip() {
    let options = ApsOptions::RETRY | ApsOptions::SRC_IEEE | ApsOptions::ENABLE_ADDR_DISCOVERY;
    assert_eq!(options.bits(), 0x1440);

    let decoded = ApsOptions::from_bits_truncate(0x1440);
    assert_eq!(decoded, options);
    assert!(!decoded.contains(ApsOptions::ENCRYPTION));
    assert!(!decoded.contains(ApsOptions::FRAGMENT));
}

#[test]
fn polled_host_completes_version_handshake() {
    let port = ScriptedPort::default();
    let mut host = Host::new(port.clone());

    let states = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&states);
    host.register_library_state_callback(Box::new(move |state| {
        observed.lock().unwrap().push(state);
    }));

    host.start().unwrap();
    assert_eq!(port.take_tx(), vec![0x1A, 0xC0, 0x38, 0xBC, 0x7E]);

    port.push_rx(&ncp::rst_ack());
    host.poll().unwrap();

    // The version command went out; answer it.
    assert!(!port.take_tx().is_empty());
    port.push_rx(&ncp::data(0, 1, &[0x00, 0x80, 0x00, 0x30, 0x6A, 0x08, 0x02]));
    host.poll().unwrap();

    assert_eq!(host.state(), HostState::Ready);
    assert_eq!(host.version().stack_version, Some(0x6A30));
    assert_eq!(
        *states.lock().unwrap(),
        vec![HostState::InitInProgress, HostState::Ready]
    );
}

#[test]
fn firmware_upgrade_reaches_transfer_ready() {
    let port = ScriptedPort::default();
    let mut host = Host::new(port.clone());

    let states = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&states);
    host.register_library_state_callback(Box::new(move |state| {
        observed.lock().unwrap().push(state);
    }));

    host.start().unwrap();
    port.push_rx(&ncp::rst_ack());
    host.poll().unwrap();

    // Complete the version handshake so the send window is free.
    port.push_rx(&ncp::data(0, 1, &[0x00, 0x80, 0x00, 0x30, 0x6A, 0x08, 0x02]));
    host.poll().unwrap();
    assert_eq!(host.state(), HostState::Ready);
    port.take_tx();

    // Reboot the NCP into its bootloader. The response is delivered but
    // deliberately not acknowledged.
    host.send_command(FrameId::LaunchStandaloneBootloader.into(), &[0x01])
        .unwrap();
    port.take_tx();
    port.push_rx(&ncp::data(1, 2, &[0x01, 0x80, 0x8F, 0x00]));
    host.poll().unwrap();
    assert!(port.take_tx().is_empty());

    // Attach the prompt parser; the bootloader prints its menu.
    host.set_firmware_upgrade_mode().unwrap();
    port.push_rx(b"\r\nGecko Bootloader v1.9.1\r\n1. upload gbl\r\n2. run\r\nBL > ");
    host.poll().unwrap();
    assert_eq!(host.state(), HostState::InBootloaderMenu);

    port.push_rx(b"\r\nbegin upload\r\nC");
    host.poll().unwrap();
    assert_eq!(host.state(), HostState::InFirmwareTransfer);

    assert_eq!(
        *states.lock().unwrap(),
        vec![
            HostState::InitInProgress,
            HostState::Ready,
            HostState::InBootloaderMenu,
            HostState::InFirmwareTransfer,
        ]
    );
}
