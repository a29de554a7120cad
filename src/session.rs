//! The bridge session: one socket, one terminal, one thread
//!
//! Each iteration of [`Session::run`] blocks in a single readiness wait over
//! the interrupt channel, the socket and standard input, then services
//! whatever was reported ready, in that order:
//!
//! 1. interrupt: end the session.
//! 2. socket: receive until a receive would block, decoding every chunk to
//!    the terminal as it arrives. A zero-length receive means the peer closed.
//!    The interrupt channel is checked after every chunk, and a drain gives
//!    way to standard input after [`MAX_DRAIN_CHUNKS`] chunks.
//! 3. standard input: read what is available and send every complete line as
//!    `encode(line)` followed by the code page's line terminator.
//!
//! Inbound data is not framed; bytes are shown as soon as they arrive.

use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;

use crate::codepage::CodePage;
use crate::error::{SessionError, SessionResult};
use crate::input::LineBuffer;
use crate::interrupt::Interrupt;
use crate::poller;

/// Largest single receive from the socket.
pub const RECV_CHUNK: usize = 1024;

/// Largest single read from standard input.
pub const INPUT_CHUNK: usize = 1024;

/// Chunks received per readiness report before standard input gets a turn.
pub const MAX_DRAIN_CHUNKS: usize = 64;

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The remote side shut down its end of the connection
    PeerClosed,
    /// The local user asked to stop
    Interrupted,
}

impl SessionEnd {
    pub fn describe(&self) -> &'static str {
        match self {
            SessionEnd::PeerClosed => "peer closed the connection",
            SessionEnd::Interrupted => "interrupted by user",
        }
    }
}

/// Traffic counters for one session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub lines_sent: u64,
    /// Received bytes with no character assignment
    pub bytes_replaced: u64,
    /// Typed characters the code page could not represent
    pub chars_substituted: u64,
}

/// Which sources the last wait reported ready.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Readiness {
    interrupt: bool,
    socket: bool,
    input: bool,
}

enum Drain {
    Open,
    PeerClosed,
    Interrupted,
}

/// Build the wire payload for one typed line.
pub fn frame_line(codepage: &CodePage, line: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(line.len() + 1);
    frame_line_into(codepage, line, &mut payload);
    payload
}

/// Returns how many characters were substituted.
fn frame_line_into(codepage: &CodePage, line: &str, out: &mut Vec<u8>) -> usize {
    let substituted = codepage.encode_into(line, out);
    out.push(codepage.line_terminator());
    substituted
}

/// Owns the socket for its whole lifetime and shuttles data between it and
/// the terminal.
///
/// `S` is the connected socket, `I` the terminal input and `O` the terminal
/// output. Production code uses a `TcpStream`, [`crate::input::RawStdin`] and
/// `io::Stdout`; tests substitute socket pairs and a `Vec<u8>`.
pub struct Session<S, I, O> {
    socket: S,
    input: Option<I>,
    output: O,
    interrupt: Interrupt,
    codepage: &'static CodePage,
    lines: LineBuffer,
    stats: SessionStats,
}

impl<S, I, O> Session<S, I, O>
where
    S: Write + AsRawFd,
    I: Read + AsRawFd,
    O: Write,
{
    /// `input` of `None` runs the session receive-only.
    pub fn new(
        socket: S,
        input: Option<I>,
        output: O,
        interrupt: Interrupt,
        codepage: &'static CodePage,
    ) -> Self {
        Self {
            socket,
            input,
            output,
            interrupt,
            codepage,
            lines: LineBuffer::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Consume the session, returning the terminal output sink.
    pub fn into_output(self) -> O {
        self.output
    }

    /// Run until the peer closes, the user interrupts, or an error occurs.
    ///
    /// No timeout applies: an idle session waits indefinitely.
    pub fn run(&mut self) -> SessionResult<SessionEnd> {
        loop {
            let ready = self.wait()?;

            if ready.interrupt {
                return Ok(SessionEnd::Interrupted);
            }

            if ready.socket {
                match self.drain_socket()? {
                    Drain::Open => {}
                    Drain::PeerClosed => return Ok(SessionEnd::PeerClosed),
                    Drain::Interrupted => return Ok(SessionEnd::Interrupted),
                }
            }

            if ready.input {
                self.drain_input()?;
            }
        }
    }

    fn wait(&self) -> SessionResult<Readiness> {
        let input_fd = self.input.as_ref().map(AsRawFd::as_raw_fd);
        let [interrupt, socket, input] = poller::wait_readable(
            [Some(self.interrupt.as_raw_fd()), Some(self.socket.as_raw_fd()), input_fd],
            None,
        )
        .map_err(SessionError::Poll)?;

        Ok(Readiness {
            interrupt,
            socket,
            input,
        })
    }

    /// Receive and display until the socket has nothing more queued, the
    /// user interrupts, or [`MAX_DRAIN_CHUNKS`] chunks have been shown.
    fn drain_socket(&mut self) -> SessionResult<Drain> {
        let mut buf = [0u8; RECV_CHUNK];
        let mut chunks = 0;
        while chunks < MAX_DRAIN_CHUNKS {
            match poller::recv_nonblocking(self.socket.as_raw_fd(), &mut buf) {
                Ok(0) => return Ok(Drain::PeerClosed),
                Ok(n) => {
                    self.display(&buf[..n])?;
                    chunks += 1;
                    if self.interrupt.is_pending().map_err(SessionError::Poll)? {
                        return Ok(Drain::Interrupted);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Drain::Open),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SessionError::Receive(e)),
            }
        }
        Ok(Drain::Open)
    }

    fn display(&mut self, chunk: &[u8]) -> SessionResult<()> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("recv ({})\t {}", chunk.len(), to_hex(chunk));
        }

        let replaced = chunk.iter().filter(|&&b| !self.codepage.is_mapped(b)).count();
        if replaced > 0 {
            log::warn!("{replaced} byte(s) with no mapping in {}", self.codepage);
        }

        let text = self.codepage.decode(chunk);
        self.output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
            .map_err(SessionError::Output)?;

        self.stats.bytes_received += chunk.len() as u64;
        self.stats.bytes_replaced += replaced as u64;
        Ok(())
    }

    /// Read what standard input has and send every complete line.
    fn drain_input(&mut self) -> SessionResult<()> {
        let Some(input) = self.input.as_mut() else {
            return Ok(());
        };

        let mut buf = [0u8; INPUT_CHUNK];
        let n = loop {
            match input.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.raw_os_error() == Some(libc::EBADF) => {
                    log::warn!("standard input is not open, continuing receive-only");
                    self.input = None;
                    return Ok(());
                }
                Err(e) => return Err(SessionError::Input(e)),
            }
        };

        if n == 0 {
            log::info!("standard input closed");
            self.input = None;
            if let Some(rest) = self.lines.take_partial() {
                self.send_line(&rest)?;
            }
            return Ok(());
        }

        self.lines.push(&buf[..n]);
        while let Some(line) = self.lines.next_line() {
            self.send_line(&line)?;
        }
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> SessionResult<()> {
        if line.is_empty() {
            // An empty line means nothing to send
            return Ok(());
        }

        let mut payload = Vec::with_capacity(line.len() + 1);
        let substituted = frame_line_into(self.codepage, line, &mut payload);
        if substituted > 0 {
            log::warn!("{substituted} character(s) not representable in {}", self.codepage);
        }

        if log::log_enabled!(log::Level::Debug) {
            log::debug!("send ({})\t {}", payload.len(), to_hex(&payload));
        }
        self.socket.write_all(&payload).map_err(SessionError::Send)?;

        self.stats.bytes_sent += payload.len() as u64;
        self.stats.lines_sent += 1;
        self.stats.chars_substituted += substituted as u64;
        Ok(())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
