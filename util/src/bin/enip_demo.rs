//! Minimal platform binding for `enip-core`: owns the real TCP/UDP sockets and the
//! per-connection receive buffers, and drives `Endpoint` across them. The CIP object model
//! itself is out of scope, so the router collaborator here just echoes SendRRData payloads
//! back and accepts every SendUnitData connection -- enough to watch a real RegisterSession
//! / SendRRData / UnRegisterSession exchange happen end to end.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use clap::{App, Arg};
use enip_core::{ConnectedRouter, ConnectionManager, DeviceConfig, Endpoint, RouterError, UnconnectedRouter, WatchdogReset};
use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Events, Poll, PollOpt, Ready, Token};

const LISTENER_TOKEN: Token = Token(0);
const UDP_TOKEN: Token = Token(1);
const FIRST_CONNECTION_TOKEN: usize = 2;

/// Stands in for the CIP object model/Unconnected Message Manager: echoes unconnected
/// requests back and rejects every connected request, since there's no connection manager
/// behind it to have produced a connection id in the first place.
struct EchoRouter;

impl UnconnectedRouter for EchoRouter {
    fn notify_unconnected(&mut self, payload: &[u8]) -> Result<Vec<u8>, RouterError> {
        Ok(payload.to_vec())
    }
}

impl ConnectedRouter for EchoRouter {
    fn notify_connected(&mut self, _connection_id: u32, _payload: &[u8]) -> Result<Vec<u8>, RouterError> {
        Err(RouterError)
    }
}

impl ConnectionManager for EchoRouter {
    fn reset_watchdog(&mut self, _connection_id: u32) -> Option<WatchdogReset> {
        None
    }

    fn on_tick(&mut self, _elapsed_ms: u32) {}
}

struct Connection {
    stream: TcpStream,
    socket_id: u64,
    buffer: Vec<u8>,
}

fn main() {
    let matches = App::new("enip_demo")
        .about("reference platform binding for the ENIP session/CPF core")
        .arg(Arg::with_name("config").long("config").takes_value(true).required(true))
        .arg(Arg::with_name("bind").long("bind").takes_value(true).default_value("0.0.0.0:44818"))
        .arg(Arg::with_name("log-level").long("log-level").takes_value(true).default_value("info"))
        .get_matches();

    let log = enip_support::logging::init(matches.value_of("log-level").unwrap());
    let config = DeviceConfig::load(matches.value_of("config").unwrap()).expect("failed to load device config");
    let bind_addr: SocketAddr = matches.value_of("bind").unwrap().parse().expect("invalid bind address");

    let rng_seed = enip_support::time::timestamp_secs() as u32;
    let mut endpoint = Endpoint::new(&config, rng_seed, EchoRouter, log.clone()).expect("failed to build endpoint");

    let poll = Poll::new().expect("failed to create poll");
    let listener = TcpListener::bind(&bind_addr).expect("failed to bind tcp listener");
    poll.register(&listener, LISTENER_TOKEN, Ready::readable(), PollOpt::edge()).unwrap();

    let udp = UdpSocket::bind(&bind_addr).expect("failed to bind udp socket");
    poll.register(&udp, UDP_TOKEN, Ready::readable(), PollOpt::edge()).unwrap();

    let mut connections: HashMap<Token, Connection> = HashMap::new();
    let mut next_token = FIRST_CONNECTION_TOKEN;
    let mut events = Events::with_capacity(1024);
    let mut last_tick = Instant::now();
    let tick_interval = Duration::from_millis(config.endpoint.tick_interval_ms as u64);

    slog::info!(log, "enip demo listening"; "addr" => bind_addr.to_string());

    loop {
        poll.poll(&mut events, Some(tick_interval)).expect("poll failed");

        for event in &events {
            match event.token() {
                LISTENER_TOKEN => accept_connections(&listener, &poll, &mut connections, &mut next_token),
                UDP_TOKEN => service_udp(&udp, &mut endpoint),
                token => service_connection(token, &mut connections, &mut endpoint),
            }
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_tick);
        if elapsed >= tick_interval {
            for due in endpoint.tick(elapsed.as_millis() as u32) {
                if let Err(err) = udp.send_to(&due.frame, &due.dest) {
                    slog::warn!(log, "failed to send delayed reply"; "error" => err.to_string());
                }
            }
            last_tick = now;
        }
    }
}

fn accept_connections(
    listener: &TcpListener,
    poll: &Poll,
    connections: &mut HashMap<Token, Connection>,
    next_token: &mut usize,
) {
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                let token = Token(*next_token);
                *next_token += 1;

                poll.register(&stream, token, Ready::readable(), PollOpt::edge()).unwrap();
                connections.insert(token, Connection { stream, socket_id: token.0 as u64, buffer: Vec::new() });
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(_) => break,
        }
    }
}

fn service_connection(token: Token, connections: &mut HashMap<Token, Connection>, endpoint: &mut Endpoint<EchoRouter>) {
    let close = {
        let conn = match connections.get_mut(&token) {
            Some(conn) => conn,
            None => return,
        };

        let mut chunk = [0u8; 4096];
        match conn.stream.read(&mut chunk) {
            Ok(0) => true,
            Ok(n) => {
                conn.buffer.extend_from_slice(&chunk[..n]);
                drain_frames(conn, endpoint)
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => false,
            Err(_) => true,
        }
    };

    if close {
        if let Some(conn) = connections.remove(&token) {
            endpoint.on_tcp_close(conn.socket_id);
        }
    }
}

/// Drains every complete frame currently sitting in `conn.buffer`, writing replies back out
/// as they're produced. Returns whether the connection should be torn down.
fn drain_frames(conn: &mut Connection, endpoint: &mut Endpoint<EchoRouter>) -> bool {
    loop {
        let outcome = endpoint.on_tcp_bytes(conn.socket_id, &conn.buffer);

        if outcome.remaining < 0 {
            // Incomplete frame; wait for more bytes.
            return false;
        }

        let consumed = conn.buffer.len() - outcome.remaining as usize;
        conn.buffer.drain(..consumed);

        if let Some(reply) = outcome.reply {
            if conn.stream.write_all(&reply).is_err() {
                return true;
            }
        }

        if outcome.close_socket {
            return true;
        }

        if conn.buffer.is_empty() {
            return false;
        }
    }
}

fn service_udp(udp: &UdpSocket, endpoint: &mut Endpoint<EchoRouter>) {
    let mut buf = [0u8; 4096];

    loop {
        match udp.recv_from(&mut buf) {
            Ok((n, peer)) => {
                if let Some(reply) = endpoint.on_udp_datagram(UDP_TOKEN.0 as u64, peer, &buf[..n]) {
                    let _ = udp.send_to(&reply, &peer);
                }
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(_) => break,
        }
    }
}
