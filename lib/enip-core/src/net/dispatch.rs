//! The per-command dispatch table (spec component 6): given a decoded header and
//! payload, decides whether/how to reply, touching the session table, delayed-reply
//! queue, and router collaborator as each command requires.

use std::net::SocketAddr;

use byteorder::{ByteOrder, LittleEndian};
use enip_support::error::{status_for, EnipError};
use enip_support::random::XorShift32;
use slog::Logger;

use crate::net::cpf::{self, AddressItem, CpfMessage, DataItem};
use crate::net::delayed::DelayedReplyQueue;
use crate::net::frame::{command, status, Header};
use crate::net::identity::{self, DeviceIdentity};
use crate::net::router::{ConnectedRouter, ConnectionManager, UnconnectedRouter};
use crate::net::session::{RegisterOutcome, SessionTable, SocketId};

/// Looks up the wire status for an error kind that always carries one (everything but
/// `RouterError`/`FrameUnderrun`, which suppress the reply instead). Keeps the
/// error->status mapping in one place (`enip_support::error::status_for`) rather than
/// hardcoding the wire constant again at each call site.
fn status_of(kind: EnipError) -> u32 {
    status_for(&kind).expect("dispatcher only maps error kinds that carry a wire status")
}

/// Result of dispatching one TCP frame.
pub struct TcpOutcome {
    pub reply: Option<Vec<u8>>,
    /// Set for UnRegisterSession: the session was released and the platform should tear
    /// the TCP socket down. The core never owns the socket, so it cannot do this itself.
    pub close_socket: bool,
}

impl TcpOutcome {
    fn reply_only(reply: Vec<u8>) -> TcpOutcome {
        TcpOutcome { reply: Some(reply), close_socket: false }
    }

    fn none() -> TcpOutcome {
        TcpOutcome { reply: None, close_socket: false }
    }
}

/// Shared context threaded through every dispatch call.
pub struct DispatchContext<'a, R> {
    pub sessions: &'a mut SessionTable,
    pub delayed: &'a mut DelayedReplyQueue,
    pub identity: &'a DeviceIdentity,
    pub device_ip: u32,
    pub rng: &'a mut XorShift32,
    pub strict_cpf: bool,
    pub router: &'a mut R,
    pub log: &'a Logger,
}

fn reply_bytes(header: &Header, payload: &[u8], status: u32) -> Vec<u8> {
    let reply_header = header.reply(payload.len() as u16, status);
    crate::net::frame::encode(&reply_header, payload)
}

fn empty_reply(header: &Header, status: u32) -> Vec<u8> {
    reply_bytes(header, &[], status)
}

pub fn dispatch_tcp<R>(ctx: &mut DispatchContext<R>, socket: SocketId, header: Header, payload: &[u8]) -> TcpOutcome
where
    R: UnconnectedRouter + ConnectedRouter + ConnectionManager,
{
    if header.options != 0 {
        slog::trace!(ctx.log, "rejecting tcp frame with nonzero options"; "command" => header.command);
        return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::UnsupportedOptions)));
    }

    match header.command {
        command::NOP => TcpOutcome::none(),
        command::LIST_SERVICES => TcpOutcome::reply_only(reply_bytes(&header, &identity::build_list_services_reply(), status::SUCCESS)),
        command::LIST_IDENTITY => {
            let reply = identity::build_list_identity_reply(ctx.identity, ctx.device_ip);
            TcpOutcome::reply_only(reply_bytes(&header, &reply, status::SUCCESS))
        }
        command::LIST_INTERFACES => TcpOutcome::reply_only(reply_bytes(&header, &identity::build_list_interfaces_reply(), status::SUCCESS)),
        command::REGISTER_SESSION => handle_register_session(ctx, socket, header, payload),
        command::UNREGISTER_SESSION => handle_unregister_session(ctx, socket, header),
        command::SEND_RR_DATA => handle_send_rr_data(ctx, socket, header, payload),
        command::SEND_UNIT_DATA => handle_send_unit_data(ctx, socket, header, payload),
        _ => {
            slog::debug!(ctx.log, "unrecognized tcp command"; "command" => header.command);
            TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::UnknownCommand)))
        }
    }
}

/// Dispatches one UDP datagram. ListIdentity never returns an immediate reply: it
/// enqueues into the delayed-reply queue and the caller observes the effect only
/// through a later `tick`.
pub fn dispatch_udp<R>(
    ctx: &mut DispatchContext<R>,
    socket: SocketId,
    peer: SocketAddr,
    header: Header,
    _payload: &[u8],
) -> Option<Vec<u8>>
where
    R: UnconnectedRouter + ConnectedRouter + ConnectionManager,
{
    if header.options != 0 {
        return Some(empty_reply(&header, status_of(EnipError::UnsupportedOptions)));
    }

    match header.command {
        command::LIST_SERVICES => Some(reply_bytes(&header, &identity::build_list_services_reply(), status::SUCCESS)),
        command::LIST_IDENTITY => {
            let reply = identity::build_list_identity_reply(ctx.identity, ctx.device_ip);
            let frame = reply_bytes(&header, &reply, status::SUCCESS);
            let raw_max_delay = LittleEndian::read_u16(&header.sender_context[0..2]);

            if !ctx.delayed.enqueue(socket, peer, frame, raw_max_delay, ctx.rng) {
                slog::warn!(ctx.log, "delayed-reply queue full, dropping udp list identity"; "socket" => socket);
            }
            None
        }
        command::LIST_INTERFACES => Some(reply_bytes(&header, &identity::build_list_interfaces_reply(), status::SUCCESS)),
        _ => Some(empty_reply(&header, status_of(EnipError::UnknownCommand))),
    }
}

fn handle_register_session<R>(ctx: &mut DispatchContext<R>, socket: SocketId, header: Header, payload: &[u8]) -> TcpOutcome
where
    R: UnconnectedRouter + ConnectedRouter + ConnectionManager,
{
    if payload.len() < 4 {
        return TcpOutcome::reply_only(empty_reply(&header, status::INCORRECT_DATA));
    }

    let protocol_version = LittleEndian::read_u16(&payload[0..2]);
    let option_flags = LittleEndian::read_u16(&payload[2..4]);

    if protocol_version != identity::ENCAP_PROTOCOL_VERSION || option_flags != 0 {
        let reply_header = header.reply(payload.len() as u16, status::UNSUPPORTED_PROTOCOL);
        return TcpOutcome::reply_only(crate::net::frame::encode(&reply_header, payload));
    }

    match ctx.sessions.register(socket) {
        RegisterOutcome::New(handle) => {
            slog::debug!(ctx.log, "registered new session"; "handle" => handle, "socket" => socket);
            let mut reply_header = header.reply(payload.len() as u16, status::SUCCESS);
            reply_header.session_handle = handle;
            TcpOutcome::reply_only(crate::net::frame::encode(&reply_header, payload))
        }
        RegisterOutcome::AlreadyRegistered(handle) => {
            let mut reply_header = header.reply(payload.len() as u16, status::UNSUPPORTED_PROTOCOL);
            reply_header.session_handle = handle;
            TcpOutcome::reply_only(crate::net::frame::encode(&reply_header, payload))
        }
        RegisterOutcome::Full => {
            slog::warn!(ctx.log, "session table full, rejecting register session");
            TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::ResourceExhausted)))
        }
    }
}

fn handle_unregister_session<R>(ctx: &mut DispatchContext<R>, socket: SocketId, header: Header) -> TcpOutcome
where
    R: UnconnectedRouter + ConnectedRouter + ConnectionManager,
{
    match ctx.sessions.validate(header.session_handle, socket) {
        Ok(()) => {
            ctx.sessions.close_by_handle(header.session_handle);
            slog::debug!(ctx.log, "unregistered session"; "handle" => header.session_handle);
            TcpOutcome { reply: None, close_socket: true }
        }
        Err(_) => TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::SessionUnknown))),
    }
}

fn handle_send_rr_data<R>(ctx: &mut DispatchContext<R>, socket: SocketId, header: Header, payload: &[u8]) -> TcpOutcome
where
    R: UnconnectedRouter + ConnectedRouter + ConnectionManager,
{
    if ctx.sessions.validate(header.session_handle, socket).is_err() {
        return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::SessionUnknown)));
    }

    if payload.len() < 6 {
        return TcpOutcome::reply_only(empty_reply(&header, status::INCORRECT_DATA));
    }

    let cpf_bytes = &payload[6..];
    let parsed = match cpf::parse(cpf_bytes, ctx.strict_cpf) {
        Ok(parsed) => parsed,
        Err(_) => return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::CpfMalformed))),
    };

    if parsed.address != AddressItem::Null {
        return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::CpfMalformed)));
    }

    let request_payload = match parsed.data {
        Some(DataItem::Unconnected(data)) => data,
        _ => return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::CpfMalformed))),
    };

    match ctx.router.notify_unconnected(request_payload) {
        Ok(response) => {
            let reply_cpf = CpfMessage::unconnected(&response);
            let mut body = Vec::with_capacity(6 + response.len() + 16);
            body.extend_from_slice(&[0u8; 6]); // interface handle + timeout
            cpf::emit(&reply_cpf, &mut body);
            TcpOutcome::reply_only(reply_bytes(&header, &body, status::SUCCESS))
        }
        Err(_) => TcpOutcome::none(),
    }
}

fn handle_send_unit_data<R>(ctx: &mut DispatchContext<R>, socket: SocketId, header: Header, payload: &[u8]) -> TcpOutcome
where
    R: UnconnectedRouter + ConnectedRouter + ConnectionManager,
{
    if ctx.sessions.validate(header.session_handle, socket).is_err() {
        return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::SessionUnknown)));
    }

    if payload.len() < 6 {
        return TcpOutcome::reply_only(empty_reply(&header, status::INCORRECT_DATA));
    }

    let cpf_bytes = &payload[6..];
    let parsed = match cpf::parse(cpf_bytes, ctx.strict_cpf) {
        Ok(parsed) => parsed,
        Err(_) => return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::CpfMalformed))),
    };

    let connection_id = match parsed.address.connection_id() {
        Some(id) if matches!(parsed.address, AddressItem::Connected { .. }) => id,
        _ => return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::CpfMalformed))),
    };

    let connected_payload = match parsed.data {
        Some(DataItem::Connected(data)) if data.len() >= 2 => data,
        _ => return TcpOutcome::reply_only(empty_reply(&header, status_of(EnipError::CpfMalformed))),
    };

    let reset = match ctx.router.reset_watchdog(connection_id) {
        Some(reset) => reset,
        None => return TcpOutcome::none(),
    };

    let sequence_number = &connected_payload[0..2];
    let remainder = &connected_payload[2..];

    match ctx.router.notify_connected(connection_id, remainder) {
        Ok(response) => {
            let mut value = Vec::with_capacity(2 + response.len());
            value.extend_from_slice(sequence_number);
            value.extend_from_slice(&response);

            let reply_cpf = CpfMessage {
                address: AddressItem::Connected { connection_id: reset.produced_connection_id },
                data: Some(DataItem::Connected(&value)),
                sockaddr: [None, None],
            };

            let mut body = Vec::with_capacity(6 + value.len() + 16);
            body.extend_from_slice(&[0u8; 6]);
            cpf::emit(&reply_cpf, &mut body);
            TcpOutcome::reply_only(reply_bytes(&header, &body, status::SUCCESS))
        }
        Err(_) => TcpOutcome::none(),
    }
}
