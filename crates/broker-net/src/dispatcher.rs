use std::collections::{HashMap, HashSet};
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::AsRawFd;

use broker_core::{BindOutcome, Broker, SessionId};
use broker_wire::{
    Command, ERR_SAME_ID, FRAME_LEN, OriginAddr, Payload, PayloadText, PublishFrame, Topic,
    decode_control, decode_publish, encode_publish,
};
use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::error::IoFault;
use crate::socket_opts::set_tcp_options;
use crate::stream::SessionStream;

const ACCEPTOR: Token = Token(0);
const UDP: Token = Token(1);
const CONSOLE: Token = Token(2);
const FIRST_SESSION_TOKEN: usize = 3;

const REPLY_SUBSCRIBED: &str = "Subscribed to topic.\n";
const REPLY_UNSUBSCRIBED: &str = "Unsubscribed from topic.\n";

/// Single-threaded cooperative dispatcher multiplexing the TCP
/// acceptor, the UDP ingest socket, the administrative console, and
/// every connected session stream (§4.4). All state mutation happens
/// here or in `Broker`; no other execution context touches it.
pub struct Dispatcher {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    udp: UdpSocket,
    broker: Broker<Token>,
    conns: HashMap<Token, SessionStream>,
    bound: HashMap<Token, SessionId>,
    awaiting_identity: HashMap<Token, bool>,
    pending_peer: HashMap<Token, SocketAddrV4>,
    closing: HashSet<Token>,
    console_buf: String,
    next_token: usize,
    running: bool,
}

impl Dispatcher {
    /// Binds TCP and UDP listeners on `port` at the wildcard IPv4
    /// address (§6.6) and registers the administrative console.
    pub fn bind(port: u16) -> Result<Self, IoFault> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);

        let mut listener = TcpListener::bind(addr.into()).map_err(|e| IoFault::new("tcp bind", e))?;
        set_tcp_options(&listener).map_err(|e| IoFault::new("tcp listener options", e))?;

        let mut udp = UdpSocket::bind(addr.into()).map_err(|e| IoFault::new("udp bind", e))?;

        let poll = Poll::new().map_err(|e| IoFault::new("poll create", e))?;
        poll.registry()
            .register(&mut listener, ACCEPTOR, Interest::READABLE)
            .map_err(|e| IoFault::new("register acceptor", e))?;
        poll.registry()
            .register(&mut udp, UDP, Interest::READABLE)
            .map_err(|e| IoFault::new("register udp", e))?;
        // stdin is not always pollable (e.g. redirected from a regular
        // file under a test harness or a supervisor); losing the
        // administrative console in that case is not fatal.
        let stdin_fd = io::stdin().as_raw_fd();
        if let Err(e) = poll.registry().register(&mut SourceFd(&stdin_fd), CONSOLE, Interest::READABLE) {
            tracing::debug!(error = %e, "administrative console not pollable; `exit` command disabled");
        }

        Ok(Self {
            poll,
            events: Events::with_capacity(256),
            listener,
            udp,
            broker: Broker::new(),
            conns: HashMap::new(),
            bound: HashMap::new(),
            awaiting_identity: HashMap::new(),
            pending_peer: HashMap::new(),
            closing: HashSet::new(),
            console_buf: String::new(),
            next_token: FIRST_SESSION_TOKEN,
            running: false,
        })
    }

    /// Runs the event loop until the administrative `exit` command is
    /// received. Blocks indefinitely in its multiplexing call between
    /// wakeups, since the broker has no timers to race against (§5).
    pub fn run(&mut self) -> Result<(), IoFault> {
        self.running = true;
        while self.running {
            self.poll.poll(&mut self.events, None).map_err(|e| IoFault::new("poll", e))?;
            let ready: Vec<(Token, bool, bool)> =
                self.events.iter().map(|e| (e.token(), e.is_readable(), e.is_writable())).collect();
            for (token, readable, writable) in ready {
                match token {
                    ACCEPTOR => self.handle_acceptor(),
                    UDP => self.handle_udp(),
                    CONSOLE => self.handle_console(),
                    t => self.handle_session_event(t, readable, writable),
                }
            }
        }
        self.shutdown();
        Ok(())
    }

    fn alloc_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn handle_acceptor(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.accept_stream(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::debug!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn accept_stream(&mut self, stream: TcpStream, peer: SocketAddr) {
        let mut session_stream = match SessionStream::new(stream) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(error = %e, "failed to configure accepted stream");
                return;
            }
        };
        let token = self.alloc_token();
        if let Err(e) = self.poll.registry().register(session_stream.inner_mut(), token, Interest::READABLE) {
            tracing::debug!(error = %e, "failed to register accepted stream");
            return;
        }
        if let SocketAddr::V4(v4) = peer {
            self.pending_peer.insert(token, v4);
        }
        self.conns.insert(token, session_stream);
        self.awaiting_identity.insert(token, true);
    }

    fn handle_session_event(&mut self, token: Token, readable: bool, writable: bool) {
        if writable && self.drain_writable(token) {
            return;
        }
        if !readable {
            return;
        }

        let Some(outcome) = self.conns.get_mut(&token).map(SessionStream::read_lines) else {
            return;
        };

        for line in outcome.lines {
            if self.closing.contains(&token) {
                break;
            }
            if *self.awaiting_identity.get(&token).unwrap_or(&false) {
                self.awaiting_identity.insert(token, false);
                self.handle_identity_line(token, &line);
            } else if self.bound.contains_key(&token) {
                self.handle_command_line(token, &line);
            }
        }

        if outcome.disconnected {
            self.handle_session_disconnect(token);
        }
    }

    /// Drains the backlog on a writable-ready stream. Returns `true`
    /// if the stream was torn down as a consequence (a rejected
    /// duplicate finishing its ERRSAMEID send, or a hard write error).
    fn drain_writable(&mut self, token: Token) -> bool {
        let Some(stream) = self.conns.get_mut(&token) else { return false };
        if stream.drain_backlog().is_err() {
            self.handle_session_disconnect(token);
            return true;
        }
        let still_backlogged = stream.has_backlog();
        self.rearm(token, still_backlogged);
        if !still_backlogged && self.closing.contains(&token) {
            self.close_stream(token);
            return true;
        }
        false
    }

    fn rearm(&mut self, token: Token, want_writable: bool) {
        let interest =
            if want_writable { Interest::READABLE | Interest::WRITABLE } else { Interest::READABLE };
        if let Some(stream) = self.conns.get_mut(&token) {
            let _ = self.poll.registry().reregister(stream.inner_mut(), token, interest);
        }
    }

    fn handle_identity_line(&mut self, token: Token, line: &str) {
        let identity = match decode_control(line, true) {
            Ok(Command::Identity(id)) => id,
            _ => {
                tracing::trace!("malformed identity announcement; dropping stream");
                self.close_stream(token);
                return;
            }
        };

        let peer = self.pending_peer.remove(&token);
        let origin = peer.map_or_else(|| OriginAddr::from_socket_addr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)), OriginAddr::from_socket_addr);

        match self.broker.bind(identity, token, origin) {
            BindOutcome::Created(id) => {
                self.bound.insert(token, id);
                tracing::info!("New client {identity} connected from {origin}.");
            }
            BindOutcome::Rebound(id, _handle) => {
                self.bound.insert(token, id);
                tracing::info!("New client {identity} connected from {origin}.");
                self.drain_sf_queue(id, token);
            }
            BindOutcome::Rejected => {
                tracing::info!("Client {identity} already connected.");
                self.send_reply(token, Topic::default(), ERR_SAME_ID);
                self.begin_closing(token);
            }
        }
    }

    fn handle_command_line(&mut self, token: Token, line: &str) {
        let id = *self.bound.get(&token).expect("bound session for command line");
        match decode_control(line, false) {
            Ok(Command::Subscribe { topic, sf }) => {
                if self.broker.subscribe(id, topic, sf) {
                    self.send_reply(token, topic, REPLY_SUBSCRIBED);
                }
            }
            Ok(Command::Unsubscribe { topic }) => {
                if self.broker.unsubscribe(id, &topic) {
                    self.send_reply(token, topic, REPLY_UNSUBSCRIBED);
                }
            }
            Ok(Command::Identity(_)) => {}
            Err(e) => tracing::trace!(error = %e, "malformed control command ignored"),
        }
    }

    fn send_reply(&mut self, token: Token, topic: Topic, text: &str) {
        let frame = PublishFrame {
            topic,
            payload: Payload::Reply(PayloadText::from_str_truncate(text)),
            origin_addr: OriginAddr::from_socket_addr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
        };
        self.write_frame_to(token, &frame);
    }

    fn drain_sf_queue(&mut self, id: SessionId, token: Token) {
        loop {
            let Some(frame) = self.broker.pending_front(id).copied() else { break };
            let bytes = encode_publish(&frame);
            let Some(stream) = self.conns.get_mut(&token) else {
                self.broker.mark_disconnected(id);
                break;
            };
            match stream.write_frame(&bytes) {
                Ok(()) => {
                    self.broker.pending_pop_front(id);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "sf drain send failed");
                    self.broker.mark_disconnected(id);
                    break;
                }
            }
        }
    }

    fn handle_udp(&mut self) {
        let mut buf = [0u8; FRAME_LEN];
        match self.udp.recv_from(&mut buf) {
            Ok((n, src)) => {
                if n != FRAME_LEN {
                    tracing::trace!(n, expected = FRAME_LEN, "dropping malformed publish datagram");
                    return;
                }
                match decode_publish(&buf) {
                    Ok(mut frame) => {
                        if let SocketAddr::V4(v4) = src {
                            frame.origin_addr = OriginAddr::from_socket_addr(v4);
                        }
                        self.publish(&frame);
                    }
                    Err(e) => tracing::trace!(error = %e, "dropping malformed publish datagram"),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => tracing::debug!(error = %e, "udp recv failed"),
        }
    }

    fn publish(&mut self, frame: &PublishFrame) {
        let plan = self.broker.publish_fan_out(frame);
        let bytes = encode_publish(frame);
        for (id, token) in plan.live {
            let Some(stream) = self.conns.get_mut(&token) else {
                self.broker.mark_disconnected(id);
                continue;
            };
            if let Err(e) = stream.write_frame(&bytes) {
                tracing::debug!(error = %e, "send failed during fan-out");
                self.broker.mark_disconnected(id);
                continue;
            }
            let armed = stream.has_backlog();
            self.rearm(token, armed);
        }
    }

    fn write_frame_to(&mut self, token: Token, frame: &PublishFrame) {
        let bytes = encode_publish(frame);
        if let Some(stream) = self.conns.get_mut(&token) {
            if stream.write_frame(&bytes).is_ok() {
                let armed = stream.has_backlog();
                self.rearm(token, armed);
            }
        }
    }

    fn handle_session_disconnect(&mut self, token: Token) {
        if let Some(&id) = self.bound.get(&token) {
            self.broker.mark_disconnected(id);
            let identity = *self.broker.session(id).identity();
            tracing::info!("Client {identity} disconnected.");
        }
        self.close_stream(token);
    }

    /// Marks a stream for close once its outstanding backlog (an
    /// ERRSAMEID reply, typically) has been flushed.
    fn begin_closing(&mut self, token: Token) {
        let still_has_backlog =
            self.conns.get(&token).map(SessionStream::has_backlog).unwrap_or(false);
        if still_has_backlog {
            self.closing.insert(token);
            self.rearm(token, true);
        } else {
            self.close_stream(token);
        }
    }

    fn close_stream(&mut self, token: Token) {
        if let Some(mut stream) = self.conns.remove(&token) {
            let _ = self.poll.registry().deregister(stream.inner_mut());
        }
        self.bound.remove(&token);
        self.awaiting_identity.remove(&token);
        self.pending_peer.remove(&token);
        self.closing.remove(&token);
    }

    fn handle_console(&mut self) {
        let mut buf = [0u8; 256];
        match io::stdin().lock().read(&mut buf) {
            Ok(0) | Err(_) => {}
            Ok(n) => {
                self.console_buf.push_str(&String::from_utf8_lossy(&buf[..n]));
                while let Some(pos) = self.console_buf.find('\n') {
                    let line: String = self.console_buf.drain(..=pos).collect();
                    if line.trim_end_matches(['\r', '\n']) == "exit" {
                        tracing::info!("console requested shutdown");
                        self.running = false;
                    }
                }
            }
        }
    }

    fn shutdown(&mut self) {
        let tokens: Vec<Token> = self.conns.keys().copied().collect();
        for token in tokens {
            self.close_stream(token);
        }
    }
}
