//! Host-side driver for EmberZNet network co-processors (NCPs).
//!
//! The NCP is reached over a serial link speaking the Asynchronous Serial
//! Host protocol, version 2 (`ASHv2`), with the EmberZNet Serial Protocol
//! (EZSP) on top. Both are defined by Silicon Labs; see
//! [UG101](https://www.silabs.com/documents/public/user-guides/ug101-uart-gateway-protocol-reference.pdf)
//! and [UG100](https://www.silabs.com/documents/public/user-guides/ug100-ezsp-reference-guide.pdf).
//!
//! Besides the reliable-transport layer and the command dispatcher, the
//! driver arbitrates between the NCP's application image and its
//! stand-alone bootloader, whose menu prompt shares the same serial link.
//!
//! This library is free software and is not affiliated with Silicon Labs.

pub use aps::ApsOptions;
pub use baud_rate::BaudRate;
pub use bootloader::{PromptEvent, PromptParser};
pub use code::Code;
pub use codec::{AshCodec, AshEvent};
pub use dongle::{Dongle, Event, Mode, Observer, ObserverHandle};
pub use driver::{AshDriver, T_ACK_ASH_RESET, T_RX_ACK_INIT, T_RX_ACK_MAX, T_RX_ACK_MIN};
pub use error::Error;
pub use ezsp::{AdapterVersion, FrameId, PROTOCOL_VERSION};
pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use host::{GpDevice, Host, HostState};
pub use protocol::{Mask, Masker, Stuff, Stuffer, Unstuff, Unstuffer};
pub use serial_port::open;
pub use status::Status;
pub use types::{FrameVec, Payload, WireFrame, MAX_PAYLOAD_SIZE};
pub use wrapping_u3::WrappingU3;

pub mod packet;

mod aps;
mod baud_rate;
mod bootloader;
mod code;
mod codec;
mod crc;
mod dongle;
mod driver;
mod error;
mod ezsp;
mod frame;
mod frame_buffer;
mod hex_slice;
mod host;
mod protocol;
mod serial_port;
mod status;
mod types;
mod wrapping_u3;

/// The ASH protocol version implemented by this crate.
pub const VERSION: u8 = 0x02;
