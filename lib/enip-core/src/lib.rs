pub mod config;
pub mod net;

pub use config::{DeviceConfig, EndpointConfig};
pub use net::endpoint::{Endpoint, TcpBytesOutcome};
pub use net::identity::DeviceIdentity;
pub use net::router::{ConnectedRouter, ConnectionManager, Router, RouterError, UnconnectedRouter, WatchdogReset};
pub use net::session::SocketId;
