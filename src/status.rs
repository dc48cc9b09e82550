/// ASH session status.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Status {
    /// No connection has been established yet.
    #[default]
    Disconnected,
    /// A `RST` frame has been sent; awaiting the NCP's `RSTACK`.
    ResetSent,
    /// A connection has been established.
    Connected,
    /// The reset handshake ran into its timeout.
    Failed,
}
