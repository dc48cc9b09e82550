//! EZSP frame identifiers and adapter metadata.

use std::fmt::{Display, Formatter};

use num_derive::{FromPrimitive, ToPrimitive};

/// The EZSP protocol version this driver requests during the
/// version handshake.
pub const PROTOCOL_VERSION: u8 = 0x08;

/// Size of the EZSP frame header: sequence, frame control, frame identifier.
pub const HEADER_SIZE: usize = 3;

/// Byte index of the frame identifier within an EZSP frame.
pub const FRAME_ID_INDEX: usize = 2;

/// Frame control byte of an outgoing command.
pub const COMMAND_FRAME_CONTROL: u8 = 0x00;

/// EZSP frame identifiers used by this driver.
///
/// The dispatcher treats frame identifiers as opaque bytes; this list
/// covers the commands and callbacks the crate itself issues or decodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum FrameId {
    /// The protocol version handshake; must be the first command.
    Version = 0x00,
    /// Fetches XNCP manufacturer and version information.
    GetXncpInfo = 0x13,
    /// Starts an energy or active scan.
    StartScan = 0x1A,
    /// Callback: a scan has completed.
    ScanCompleteHandler = 0x1C,
    /// Stops a scan in progress.
    StopScan = 0x34,
    /// Callback: energy level measured on one channel.
    EnergyScanResultHandler = 0x48,
    /// Reboots the NCP into its stand-alone bootloader.
    ///
    /// No serial traffic may follow this command.
    LaunchStandaloneBootloader = 0x8F,
    /// Sets the radio channel.
    SetRadioChannel = 0x9A,
    /// Callback: an incoming green-power frame.
    GpepIncomingMessageHandler = 0xC5,
    /// Sends a green-power frame.
    DGpSend = 0xC6,
    /// Adds or updates a green-power sink/proxy pairing.
    GpProxyTableProcessGpPairing = 0xC9,
    /// Removes a green-power sink table entry.
    GpSinkTableRemoveEntry = 0xE0,
    /// Allocates a green-power sink table entry.
    GpSinkTableFindOrAllocateEntry = 0xE1,
    /// Clears the green-power sink table.
    GpSinkTableClearAll = 0xE2,
}

impl From<FrameId> for u8 {
    fn from(frame_id: FrameId) -> Self {
        frame_id as Self
    }
}

/// Version information of the EZSP adapter, filled in as the
/// individual pieces are fetched from the NCP.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AdapterVersion {
    pub stack_version: Option<u16>,
    pub protocol_version: Option<u8>,
    pub stack_type: Option<u8>,
    pub xncp_manufacturer_id: Option<u16>,
    pub xncp_version_number: Option<u16>,
}

impl AdapterVersion {
    /// Records the data retrieved by the EZSP version handshake.
    pub fn set_ezsp_version_info(
        &mut self,
        stack_version: u16,
        protocol_version: u8,
        stack_type: u8,
    ) {
        self.stack_version = Some(stack_version);
        self.protocol_version = Some(protocol_version);
        self.stack_type = Some(stack_type);
    }

    /// Records the data retrieved by the XNCP info command.
    pub fn set_xncp_data(&mut self, manufacturer_id: u16, version_number: u16) {
        self.xncp_manufacturer_id = Some(manufacturer_id);
        self.xncp_version_number = Some(version_number);
    }
}

impl Display for AdapterVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.stack_version {
            Some(stack_version) => write!(
                f,
                "EZSPv{} stack type {}, version {}.{}.{}.{}",
                self.protocol_version.unwrap_or_default(),
                self.stack_type.unwrap_or_default(),
                (stack_version >> 12) & 0x0F,
                (stack_version >> 8) & 0x0F,
                (stack_version >> 4) & 0x0F,
                stack_version & 0x0F,
            ),
            None => write!(f, "unknown adapter version"),
        }
    }
}
