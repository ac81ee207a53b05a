//! Collaborator contracts the dispatcher bridges CPF payloads into. Neither the CIP
//! object model's message router nor the Connection Manager is implemented here; these
//! traits are the seam a real implementation plugs into.

/// Marker error: the collaborator declined to produce a reply. The dispatcher suppresses
/// the outbound frame rather than emit a malformed one; the transport/connection stays
/// live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterError;

/// Bridges an unconnected (SendRRData) CIP request to the Unconnected Message Manager.
pub trait UnconnectedRouter {
    fn notify_unconnected(&mut self, payload: &[u8]) -> Result<Vec<u8>, RouterError>;
}

/// Bridges a connected (SendUnitData) CIP request to the target class-3 connection.
pub trait ConnectedRouter {
    fn notify_connected(&mut self, connection_id: u32, payload: &[u8]) -> Result<Vec<u8>, RouterError>;
}

/// The result of successfully resetting a connection's inactivity watchdog: the peer's
/// produced-connection id, substituted into the response address item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogReset {
    pub produced_connection_id: u32,
}

/// The Connection Manager collaborator: owns connection references (id, produced id,
/// watchdog, RPI, timeout multiplier) and is also the target of the periodic tick
/// forwarded from §4.8.
pub trait ConnectionManager {
    /// Resets `connection_id`'s inactivity watchdog using its configured O->T RPI and
    /// timeout multiplier. Returns `None` if the connection id is unknown, which the
    /// dispatcher treats as a router failure (suppressed reply).
    fn reset_watchdog(&mut self, connection_id: u32) -> Option<WatchdogReset>;

    /// Forwarded once per tick, after delayed UDP replies have been processed.
    fn on_tick(&mut self, elapsed_ms: u32);
}

/// Convenience bound satisfied by a single collaborator that implements all three
/// contracts -- the common case, since the UCMM and Connection Manager typically share
/// access to the same CIP object registry.
pub trait Router: UnconnectedRouter + ConnectedRouter + ConnectionManager {}

impl<T: UnconnectedRouter + ConnectedRouter + ConnectionManager> Router for T {}
