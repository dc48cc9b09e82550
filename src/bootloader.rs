//! Parser for the stand-alone bootloader's text menu.

use std::io::{self, Write};

use log::{debug, trace};

/// The tail of the bootloader's menu banner.
const PROMPT: &[u8] = b"BL >";

/// Menu key starting a firmware upload.
const UPGRADE_KEY: u8 = b'1';

/// Menu key launching the application image.
const RUN_KEY: u8 = b'2';

/// Handshake character the bootloader emits once its XMODEM
/// receiver is ready for the first block.
const TRANSFER_READY: u8 = b'C';

/// Notifications produced while scanning the bootloader's output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PromptEvent {
    /// The menu prompt has been detected.
    PromptDetected,
    /// The XMODEM receiver is ready; the firmware transfer may start.
    TransferReady,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ScanState {
    /// Looking for the menu prompt.
    Prompt,
    /// "Upgrade firmware" was selected; looking for the XMODEM handshake.
    Handshake,
    /// Detection fired; scanning is paused until the next [`PromptParser::reset`].
    Idle,
}

/// Scans the incoming byte stream for the bootloader prompt and issues
/// menu selections.
///
/// Detection fires once per arming; call [`reset`](Self::reset) to re-arm.
#[derive(Debug)]
pub struct PromptParser {
    window: Vec<u8>,
    state: ScanState,
}

impl PromptParser {
    /// Creates a new parser, armed for prompt detection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: Vec::new(),
            state: ScanState::Prompt,
        }
    }

    /// Clears the scan window and re-arms prompt detection.
    pub fn reset(&mut self) {
        self.window.clear();
        self.state = ScanState::Prompt;
    }

    /// Scans received bytes for the prompt or the XMODEM handshake.
    pub fn receive(&mut self, bytes: &[u8]) -> Vec<PromptEvent> {
        let mut events = Vec::new();

        match self.state {
            ScanState::Prompt => {
                self.window.extend_from_slice(bytes);

                if window_contains(&self.window, PROMPT) {
                    debug!("Detected bootloader prompt.");
                    self.window.clear();
                    self.state = ScanState::Idle;
                    events.push(PromptEvent::PromptDetected);
                } else {
                    // Only a prompt-sized tail can still complete a match.
                    let excess = self.window.len().saturating_sub(PROMPT.len() - 1);
                    self.window.drain(..excess);
                }
            }
            ScanState::Handshake => {
                if bytes.contains(&TRANSFER_READY) {
                    debug!("Bootloader is ready to receive the firmware image.");
                    self.state = ScanState::Idle;
                    events.push(PromptEvent::TransferReady);
                }
            }
            ScanState::Idle => {
                trace!("Ignoring {} bytes of bootloader output.", bytes.len());
            }
        }

        events
    }

    /// Selects "run application" in the bootloader menu.
    ///
    /// # Errors
    ///
    /// Returns an error if the menu key cannot be written.
    pub fn select_mode_run<W: Write>(&mut self, port: &mut W) -> io::Result<()> {
        debug!("Selecting bootloader menu entry: run application.");
        self.state = ScanState::Idle;
        port.write_all(&[RUN_KEY])?;
        port.flush()
    }

    /// Selects "upgrade firmware" in the bootloader menu and starts
    /// watching for the XMODEM handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the menu key cannot be written.
    pub fn select_mode_upgrade_fw<W: Write>(&mut self, port: &mut W) -> io::Result<()> {
        debug!("Selecting bootloader menu entry: upgrade firmware.");
        self.state = ScanState::Handshake;
        port.write_all(&[UPGRADE_KEY])?;
        port.flush()
    }
}

impl Default for PromptParser {
    fn default() -> Self {
        Self::new()
    }
}

fn window_contains(window: &[u8], needle: &[u8]) -> bool {
    window.windows(needle.len()).any(|chunk| chunk == needle)
}
