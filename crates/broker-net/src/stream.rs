use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};

use mio::net::TcpStream;

use crate::socket_opts::set_tcp_options;

/// Control lines are bounded by the receive buffer (§4.1): 4096
/// bytes, matching the distilled source's `BUFLEN`.
const READ_CHUNK: usize = 4096;
const MAX_LINE_BUF: usize = READ_CHUNK;

/// Result of one readable-event's worth of reading on a session
/// stream: zero or more complete control lines, and whether the
/// peer has closed (or the read otherwise failed, which is treated
/// identically per §7).
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub lines: Vec<String>,
    pub disconnected: bool,
}

/// Per-session TCP stream: buffers partial control lines across
/// reads (resolving the buffering ambiguity noted in the design
/// notes) and queues fixed-size publish/reply frames that could not
/// be written in full, draining them when the socket becomes
/// writable again — the same write-or-enqueue discipline this
/// workspace's other TCP stream type uses, generalized from a
/// length-prefixed frame to this protocol's fixed frame.
pub struct SessionStream {
    stream: TcpStream,
    read_buf: Vec<u8>,
    send_backlog: VecDeque<Vec<u8>>,
}

impl SessionStream {
    pub(crate) fn new(stream: TcpStream) -> io::Result<Self> {
        set_tcp_options(&stream)?;
        Ok(Self { stream, read_buf: Vec::with_capacity(READ_CHUNK), send_backlog: VecDeque::new() })
    }

    pub(crate) fn inner_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    #[must_use]
    pub(crate) fn has_backlog(&self) -> bool {
        !self.send_backlog.is_empty()
    }

    /// Reads everything currently available and extracts every
    /// complete `\n`-terminated line, retaining any trailing partial
    /// line as residue for the next call.
    pub(crate) fn read_lines(&mut self) -> ReadOutcome {
        let mut disconnected = false;
        loop {
            let mut chunk = [0u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    disconnected = true;
                    break;
                }
                Ok(n) => {
                    self.read_buf.extend_from_slice(&chunk[..n]);
                    if self.read_buf.len() > MAX_LINE_BUF && !self.read_buf.contains(&b'\n') {
                        // a peer that never terminates a line is malformed traffic,
                        // not a buffering bug; drop the connection rather than grow forever.
                        disconnected = true;
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => {
                    disconnected = true;
                    break;
                }
            }
        }
        let lines = self.drain_complete_lines();
        ReadOutcome { lines, disconnected }
    }

    fn drain_complete_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.read_buf.iter().position(|&b| b == b'\n') {
            let mut line_bytes: Vec<u8> = self.read_buf.drain(..=pos).collect();
            line_bytes.pop();
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.pop();
            }
            if let Ok(s) = String::from_utf8(line_bytes) {
                lines.push(s);
            }
        }
        lines
    }

    /// Writes a frame, queuing whatever does not fit in one call.
    /// Per §5, send failures here are surfaced to the caller, which
    /// marks the session disconnected; they are never retried
    /// internally beyond normal partial-write handling.
    pub(crate) fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.send_backlog.is_empty() {
            self.send_backlog.push_back(bytes.to_vec());
            return Ok(());
        }
        match self.stream.write(bytes) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(n) => {
                self.send_backlog.push_back(bytes[n..].to_vec());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                self.send_backlog.push_back(bytes.to_vec());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drains as much of the backlog as the socket will currently
    /// accept. Called when the stream becomes writable.
    pub(crate) fn drain_backlog(&mut self) -> io::Result<()> {
        while let Some(buf) = self.send_backlog.front_mut() {
            match self.stream.write(buf) {
                Ok(n) if n == buf.len() => {
                    self.send_backlog.pop_front();
                }
                Ok(n) => {
                    buf.drain(..n);
                    break;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener as StdTcpListener;

    use super::*;

    fn connected_pair() -> (SessionStream, std::net::TcpStream) {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (SessionStream::new(TcpStream::from_std(server)).unwrap(), client)
    }

    #[test]
    fn buffers_a_partial_line_across_reads() {
        let (mut server, mut client) = connected_pair();
        client.write_all(b"sub").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let outcome = server.read_lines();
        assert!(outcome.lines.is_empty());
        assert!(!outcome.disconnected);

        client.write_all(b"scribe t 1\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let outcome = server.read_lines();
        assert_eq!(outcome.lines, vec!["subscribe t 1".to_string()]);
    }

    #[test]
    fn splits_pipelined_commands_in_one_write() {
        let (mut server, mut client) = connected_pair();
        client.write_all(b"subscribe a 0\nsubscribe b 1\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let outcome = server.read_lines();
        assert_eq!(outcome.lines, vec!["subscribe a 0".to_string(), "subscribe b 1".to_string()]);
    }

    #[test]
    fn strips_trailing_cr() {
        let (mut server, mut client) = connected_pair();
        client.write_all(b"unsubscribe t\r\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let outcome = server.read_lines();
        assert_eq!(outcome.lines, vec!["unsubscribe t".to_string()]);
    }

    #[test]
    fn zero_byte_read_reports_disconnected() {
        let (mut server, client) = connected_pair();
        drop(client);
        std::thread::sleep(std::time::Duration::from_millis(20));
        let outcome = server.read_lines();
        assert!(outcome.disconnected);
    }
}
