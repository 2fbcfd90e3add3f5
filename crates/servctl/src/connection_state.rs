/// Binding state of a `ConnectionManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No binding, no attempt in flight
    Disconnected,
    /// A bind attempt is in flight
    Connecting,
    /// Bound; the service proxy is usable
    Connected,
}
