//! The public boundary (spec §4.9): the single type a platform embeds. `Endpoint` never
//! owns a socket -- the platform hands it bytes/datagrams as they arrive and gets back
//! whatever reply (if any) should be written back out.

use std::net::SocketAddr;

use enip_support::random::XorShift32;
use slog::Logger;

use crate::config::{DeviceConfig, EndpointConfig};
use crate::net::delayed::{DelayedReply, DelayedReplyQueue};
use crate::net::dispatch::{self, DispatchContext, TcpOutcome};
use crate::net::frame;
use crate::net::identity::DeviceIdentity;
use crate::net::router::{ConnectedRouter, ConnectionManager, UnconnectedRouter};
use crate::net::session::{SessionTable, SocketId};

/// Outcome of feeding one TCP frame's worth of bytes in. `remaining` mirrors
/// `frame::decode`'s `bytes_remaining`: positive means another frame is already in
/// `buffer` and the platform should call `on_tcp_bytes` again with the tail; negative
/// means the frame is incomplete and the platform must wait for more bytes.
pub struct TcpBytesOutcome {
    pub reply: Option<Vec<u8>>,
    pub remaining: isize,
    /// Set once, for UnRegisterSession: the core released the session and the platform
    /// should tear the socket down. The core never owns the socket, so it can't do this
    /// itself.
    pub close_socket: bool,
}

/// Handles all session/CPF bookkeeping for one ENIP device. Generic over the collaborator
/// `R` that owns the CIP object model the Unconnected Message Manager and Connection
/// Manager dispatch into.
pub struct Endpoint<R> {
    sessions: SessionTable,
    delayed: DelayedReplyQueue,
    identity: DeviceIdentity,
    device_ip: u32,
    rng: XorShift32,
    config: EndpointConfig,
    router: R,
    log: Logger,
}

impl<R> Endpoint<R>
where
    R: UnconnectedRouter + ConnectedRouter + ConnectionManager,
{
    /// Builds a new endpoint from a loaded device configuration and an rng seed. The seed
    /// should vary per process (e.g. a timestamp) in production; tests pass fixed seeds for
    /// reproducibility.
    pub fn new(config: &DeviceConfig, rng_seed: u32, router: R, log: Logger) -> enip_support::error::EnipResult<Endpoint<R>> {
        let device_ip = config.device_ip_u32()?;

        Ok(Endpoint {
            sessions: SessionTable::new(config.endpoint.session_capacity),
            delayed: DelayedReplyQueue::new(config.endpoint.delayed_reply_capacity),
            identity: config.device.clone(),
            device_ip,
            rng: XorShift32::new(rng_seed),
            config: config.endpoint.clone(),
            router,
            log,
        })
    }

    /// Processes one frame's worth of bytes arriving on a TCP connection identified by
    /// `socket`. Never retains `buffer` past this call -- the platform owns accumulation of
    /// partially-received frames.
    pub fn on_tcp_bytes(&mut self, socket: SocketId, buffer: &[u8]) -> TcpBytesOutcome {
        let (header, payload, remaining) = match frame::decode(buffer) {
            Ok(decoded) => decoded,
            Err(_) => return TcpBytesOutcome { reply: None, remaining: -1, close_socket: false },
        };

        let mut ctx = self.dispatch_ctx();
        let TcpOutcome { reply, close_socket } = dispatch::dispatch_tcp(&mut ctx, socket, header, payload);

        TcpBytesOutcome { reply, remaining, close_socket }
    }

    /// Processes one UDP datagram from `peer`. Unlike TCP, a datagram is always exactly one
    /// frame; there is no `remaining` concept.
    pub fn on_udp_datagram(&mut self, socket: SocketId, peer: SocketAddr, datagram: &[u8]) -> Option<Vec<u8>> {
        let (header, payload, _) = match frame::decode(datagram) {
            Ok(decoded) => decoded,
            Err(_) => return None,
        };

        let mut ctx = self.dispatch_ctx();
        dispatch::dispatch_udp(&mut ctx, socket, peer, header, payload)
    }

    /// Notifies the endpoint that a TCP connection dropped, releasing any session bound to
    /// it. Idempotent: closing an already-unbound socket is a no-op.
    pub fn on_tcp_close(&mut self, socket: SocketId) {
        if let Some(handle) = self.sessions.close_by_socket(socket) {
            slog::debug!(self.log, "released session on socket close"; "handle" => handle, "socket" => socket);
        }
    }

    /// Advances time by `elapsed_ms`, draining any delayed UDP replies now due and
    /// forwarding the tick to the connection manager. Returns the replies the platform
    /// should write out, each tagged with the socket/destination it was queued against.
    pub fn tick(&mut self, elapsed_ms: u32) -> Vec<DelayedReply> {
        let due = self.delayed.tick(elapsed_ms);
        self.router.on_tick(elapsed_ms);
        due
    }

    /// Releases all sessions and pending delayed replies. Intended for a clean platform
    /// shutdown, not for mid-run recovery.
    pub fn shutdown(&mut self) {
        self.sessions.clear();
        self.delayed.clear();
        slog::info!(self.log, "endpoint shut down");
    }

    pub fn has_live_session(&self, session_handle: u32) -> bool {
        self.sessions.lookup(session_handle).is_some()
    }

    fn dispatch_ctx(&mut self) -> DispatchContext<'_, R> {
        DispatchContext {
            sessions: &mut self.sessions,
            delayed: &mut self.delayed,
            identity: &self.identity,
            device_ip: self.device_ip,
            rng: &mut self.rng,
            strict_cpf: self.config.strict_cpf,
            router: &mut self.router,
            log: &self.log,
        }
    }
}

/// Small convenience conversion so a platform built on `mio` can use a socket's raw `mio`
/// token directly as the opaque `SocketId` the core expects.
pub fn socket_id_from_token(token: mio::Token) -> SocketId {
    token.0 as SocketId
}

pub fn token_from_socket_id(socket: SocketId) -> mio::Token {
    mio::Token(socket as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};
    use crate::net::frame::{command, status};
    use crate::net::router::{RouterError, WatchdogReset};

    struct NullRouter;

    impl UnconnectedRouter for NullRouter {
        fn notify_unconnected(&mut self, _payload: &[u8]) -> Result<Vec<u8>, RouterError> {
            Err(RouterError)
        }
    }

    impl ConnectedRouter for NullRouter {
        fn notify_connected(&mut self, _connection_id: u32, _payload: &[u8]) -> Result<Vec<u8>, RouterError> {
            Err(RouterError)
        }
    }

    impl ConnectionManager for NullRouter {
        fn reset_watchdog(&mut self, _connection_id: u32) -> Option<WatchdogReset> {
            None
        }

        fn on_tick(&mut self, _elapsed_ms: u32) {}
    }

    fn test_config() -> DeviceConfig {
        DeviceConfig {
            device: DeviceIdentity {
                vendor_id: 1,
                device_type: 0x0C,
                product_code: 65001,
                revision_major: 1,
                revision_minor: 0,
                status_word: 0,
                serial_number: 0x1234_5678,
                product_name: "opener".into(),
                state: 0xFF,
            },
            device_ip: "192.168.1.10".into(),
            endpoint: EndpointConfig::default(),
        }
    }

    fn test_endpoint() -> Endpoint<NullRouter> {
        let log = Logger::root(slog::Discard, slog::o!());
        Endpoint::new(&test_config(), 1, NullRouter, log).unwrap()
    }

    #[test]
    fn register_then_unregister_round_trips_a_session() {
        let mut endpoint = test_endpoint();

        let register_header = frame::Header {
            command: command::REGISTER_SESSION,
            length: 4,
            session_handle: 0,
            status: 0,
            sender_context: [0; 8],
            options: 0,
        };
        let register_bytes = frame::encode(&register_header, &[0x01, 0x00, 0x00, 0x00]);

        let outcome = endpoint.on_tcp_bytes(1, &register_bytes);
        assert_eq!(outcome.remaining, 0);
        let (reply_header, _, _) = frame::decode(&outcome.reply.unwrap()).unwrap();
        assert_eq!(reply_header.status, status::SUCCESS);
        let handle = reply_header.session_handle;
        assert_ne!(handle, 0);

        let unregister_header = frame::Header {
            command: command::UNREGISTER_SESSION,
            length: 0,
            session_handle: handle,
            status: 0,
            sender_context: [0; 8],
            options: 0,
        };
        let unregister_bytes = frame::encode(&unregister_header, &[]);

        let outcome = endpoint.on_tcp_bytes(1, &unregister_bytes);
        assert!(outcome.reply.is_none());
        assert!(outcome.close_socket);
        assert!(!endpoint.has_live_session(handle));
    }

    #[test]
    fn on_tcp_close_releases_the_bound_session() {
        let mut endpoint = test_endpoint();

        let register_header = frame::Header {
            command: command::REGISTER_SESSION,
            length: 4,
            session_handle: 0,
            status: 0,
            sender_context: [0; 8],
            options: 0,
        };
        let register_bytes = frame::encode(&register_header, &[0x01, 0x00, 0x00, 0x00]);
        let outcome = endpoint.on_tcp_bytes(3, &register_bytes);
        let (reply_header, _, _) = frame::decode(&outcome.reply.unwrap()).unwrap();
        let handle = reply_header.session_handle;

        endpoint.on_tcp_close(3);
        assert!(!endpoint.has_live_session(handle));
    }

    #[test]
    fn udp_list_identity_is_deferred_and_surfaces_on_tick() {
        let mut endpoint = test_endpoint();

        let mut header = frame::Header {
            command: command::LIST_IDENTITY,
            length: 0,
            session_handle: 0,
            status: 0,
            sender_context: [0; 8],
            options: 0,
        };
        LittleEndian::write_u16(&mut header.sender_context[0..2], 1);
        let datagram = frame::encode(&header, &[]);

        let peer: SocketAddr = "10.0.0.5:44818".parse().unwrap();
        let immediate = endpoint.on_udp_datagram(9, peer, &datagram);
        assert!(immediate.is_none());

        let mut due = Vec::new();
        for _ in 0..5000 {
            due = endpoint.tick(1);
            if !due.is_empty() {
                break;
            }
        }

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].dest, peer);
    }

    #[test]
    fn shutdown_clears_sessions_and_pending_replies() {
        let mut endpoint = test_endpoint();

        let register_header = frame::Header {
            command: command::REGISTER_SESSION,
            length: 4,
            session_handle: 0,
            status: 0,
            sender_context: [0; 8],
            options: 0,
        };
        let register_bytes = frame::encode(&register_header, &[0x01, 0x00, 0x00, 0x00]);
        let outcome = endpoint.on_tcp_bytes(1, &register_bytes);
        let (reply_header, _, _) = frame::decode(&outcome.reply.unwrap()).unwrap();

        endpoint.shutdown();
        assert!(!endpoint.has_live_session(reply_header.session_handle));
    }

    #[test]
    fn mio_token_round_trips_through_socket_id() {
        let token = mio::Token(42);
        let socket = socket_id_from_token(token);
        assert_eq!(token_from_socket_id(socket), token);
    }
}
