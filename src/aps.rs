//! APS transmission options bitmap.

use bitflags::bitflags;

bitflags! {
    /// APS-layer transmission options, packed into the 16-bit bitmap
    /// used by EmberZNet.
    ///
    /// Undefined bits are zero on encode and ignored on decode.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct ApsOptions: u16 {
        /// Send the message with APS encryption using the link key.
        const ENCRYPTION = 1 << 5;
        /// Resend the message using the APS retry mechanism.
        const RETRY = 1 << 6;
        /// Initiate a route discovery if no route is known.
        const ENABLE_ROUTE_DISCOVERY = 1 << 8;
        /// Initiate a route discovery even if a route is known.
        const FORCE_ROUTE_DISCOVERY = 1 << 9;
        /// Include the source EUI64 in the network frame.
        const SRC_IEEE = 1 << 10;
        /// Include the destination EUI64 in the network frame.
        const DEST_IEEE = 1 << 11;
        /// Discover the destination node ID via ZDO if unknown.
        const ENABLE_ADDR_DISCOVERY = 1 << 12;
        /// The application answers this ZDO request itself.
        const ZDO_RSP_REQUIRED = 1 << 14;
        /// The message is a fragment of a larger message.
        const FRAGMENT = 1 << 15;
    }
}

impl ApsOptions {
    /// The default options used for outgoing unicasts: retry,
    /// route discovery, source EUI64 and address discovery.
    #[must_use]
    pub fn unicast_defaults() -> Self {
        Self::RETRY | Self::ENABLE_ROUTE_DISCOVERY | Self::SRC_IEEE | Self::ENABLE_ADDR_DISCOVERY
    }
}
