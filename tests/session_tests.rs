//! Session loop tests
//!
//! The socket and the terminal input are Unix socket pairs, so the tests
//! drive the real `poll(2)` loop without touching the network or the real
//! standard input.

use std::io::{Read, Write};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use netebcdicat::codepage::{self, CodePage};
use netebcdicat::error::SessionError;
use netebcdicat::interrupt::{Interrupt, InterruptTrigger};
use netebcdicat::session::{Session, SessionEnd, SessionStats};

type TestSession = Session<UnixStream, UnixStream, Vec<u8>>;

/// Both ends of everything a session touches.
struct Harness {
    session: TestSession,
    peer: UnixStream,
    keyboard: UnixStream,
    trigger: InterruptTrigger,
}

fn harness(codepage: &'static CodePage) -> Harness {
    let (socket, peer) = UnixStream::pair().unwrap();
    let (input, keyboard) = UnixStream::pair().unwrap();
    let (interrupt, trigger) = Interrupt::pair().unwrap();
    Harness {
        session: Session::new(socket, Some(input), Vec::new(), interrupt, codepage),
        peer,
        keyboard,
        trigger,
    }
}

fn cp037() -> &'static CodePage {
    codepage::lookup("cp037").unwrap()
}

fn output_text(session: TestSession) -> String {
    String::from_utf8(session.into_output()).unwrap()
}

type Outcome = (Result<SessionEnd, SessionError>, SessionStats, String);

/// Run the session on its own thread so the test can play the peer.
fn spawn(mut session: TestSession) -> thread::JoinHandle<Outcome> {
    thread::spawn(move || {
        let end = session.run();
        let stats = session.stats();
        (end, stats, output_text(session))
    })
}

fn read_from_peer(peer: &mut UnixStream, len: usize) -> Vec<u8> {
    peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut buf = vec![0u8; len];
    peer.read_exact(&mut buf).unwrap();
    buf
}

#[test]
fn test_hello_from_peer_is_printed() {
    let Harness {
        mut session,
        mut peer,
        keyboard: _keyboard,
        trigger: _trigger,
    } = harness(cp037());

    peer.write_all(&[0xC8, 0xC5, 0xD3, 0xD3, 0xD6]).unwrap();
    drop(peer);

    assert_eq!(session.run().unwrap(), SessionEnd::PeerClosed);
    assert_eq!(session.stats().bytes_received, 5);
    assert_eq!(output_text(session), "HELLO");
}

#[test]
fn test_typed_line_is_sent_with_terminator() {
    let Harness {
        session,
        mut peer,
        mut keyboard,
        trigger: _trigger,
    } = harness(cp037());
    let handle = spawn(session);

    keyboard.write_all(b"HI\n").unwrap();
    assert_eq!(read_from_peer(&mut peer, 3), vec![0xC8, 0xC9, 0x15]);
    drop(peer);

    let (end, stats, _) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
    assert_eq!(stats.lines_sent, 1);
    assert_eq!(stats.bytes_sent, 3);
}

#[test]
fn test_empty_lines_send_nothing() {
    let Harness {
        session,
        mut peer,
        mut keyboard,
        trigger: _trigger,
    } = harness(cp037());
    let handle = spawn(session);

    // An empty line would show up as a lone 0x15 ahead of "OK"
    keyboard.write_all(b"\n\r\nOK\n").unwrap();
    assert_eq!(read_from_peer(&mut peer, 3), vec![0xD6, 0xD2, 0x15]);
    drop(peer);

    let (end, stats, _) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
    assert_eq!(stats.lines_sent, 1);
}

#[test]
fn test_line_split_across_reads() {
    let Harness {
        session,
        mut peer,
        mut keyboard,
        trigger: _trigger,
    } = harness(cp037());
    let handle = spawn(session);

    keyboard.write_all(b"LIST").unwrap();
    thread::sleep(Duration::from_millis(50));
    keyboard.write_all(b"\r\n").unwrap();
    assert_eq!(
        read_from_peer(&mut peer, 5),
        vec![0xD3, 0xC9, 0xE2, 0xE3, 0x15]
    );
    drop(peer);

    let (end, _, _) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
}

#[test]
fn test_unmapped_byte_is_replaced_and_session_continues() {
    let Harness {
        session,
        mut peer,
        mut keyboard,
        trigger: _trigger,
    } = harness(codepage::default_codepage());
    let handle = spawn(session);

    peer.write_all(&[0xC8, 0xFF, 0xC9]).unwrap();
    // The session still relays input after the bad byte
    keyboard.write_all(b"A\n").unwrap();
    assert_eq!(read_from_peer(&mut peer, 2), vec![0xC1, 0x15]);
    drop(peer);

    let (end, stats, output) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
    assert_eq!(output, "H\u{FFFD}I");
    assert_eq!(stats.bytes_replaced, 1);
}

#[test]
fn test_interrupt_ends_session() {
    let Harness {
        mut session,
        peer: _peer,
        keyboard: _keyboard,
        mut trigger,
    } = harness(cp037());

    trigger.fire().unwrap();
    assert_eq!(session.run().unwrap(), SessionEnd::Interrupted);
    assert_eq!(session.stats(), SessionStats::default());
}

#[test]
fn test_interrupt_while_idle() {
    let Harness {
        session,
        peer: _peer,
        keyboard: _keyboard,
        mut trigger,
    } = harness(cp037());
    let handle = spawn(session);

    thread::sleep(Duration::from_millis(50));
    trigger.fire().unwrap();

    let (end, _, output) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::Interrupted);
    assert!(output.is_empty());
}

#[test]
fn test_input_eof_flushes_partial_line_and_keeps_receiving() {
    let Harness {
        session,
        mut peer,
        keyboard,
        trigger: _trigger,
    } = harness(cp037());
    let handle = spawn(session);

    let mut keyboard = keyboard;
    keyboard.write_all(b"AB").unwrap();
    drop(keyboard);
    assert_eq!(read_from_peer(&mut peer, 3), vec![0xC1, 0xC2, 0x15]);

    // Standard input is gone but peer output is still shown
    peer.write_all(&[0xE8, 0xC5, 0xE2]).unwrap();
    drop(peer);

    let (end, _, output) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
    assert_eq!(output, "YES");
}

#[test]
fn test_large_burst_is_fully_drained() {
    let Harness {
        mut session,
        mut peer,
        keyboard: _keyboard,
        trigger: _trigger,
    } = harness(cp037());

    let burst = vec![0xC1u8; 5000];
    peer.write_all(&burst).unwrap();
    drop(peer);

    assert_eq!(session.run().unwrap(), SessionEnd::PeerClosed);
    assert_eq!(session.stats().bytes_received, 5000);
    assert_eq!(output_text(session), "A".repeat(5000));
}

#[test]
fn test_unrepresentable_character_is_substituted() {
    let Harness {
        session,
        mut peer,
        mut keyboard,
        trigger: _trigger,
    } = harness(cp037());
    let handle = spawn(session);

    keyboard.write_all("5\u{20AC}\n".as_bytes()).unwrap();
    assert_eq!(read_from_peer(&mut peer, 3), vec![0xF5, 0x3F, 0x15]);
    drop(peer);

    let (end, stats, _) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
    assert_eq!(stats.chars_substituted, 1);
}

#[test]
fn test_receive_only_session() {
    let (socket, mut peer) = UnixStream::pair().unwrap();
    let (interrupt, _trigger) = Interrupt::pair().unwrap();
    let mut session: TestSession = Session::new(socket, None, Vec::new(), interrupt, cp037());

    peer.write_all(&[0xD6, 0xD2]).unwrap();
    drop(peer);

    assert_eq!(session.run().unwrap(), SessionEnd::PeerClosed);
    assert_eq!(output_text(session), "OK");
}

#[test]
fn test_send_to_closed_peer_is_fatal() {
    let Harness {
        session,
        peer,
        mut keyboard,
        trigger: _trigger,
    } = harness(cp037());

    // Shut down only the peer's read side: the session sees no hang-up on
    // its receive path, but its send fails.
    peer.shutdown(std::net::Shutdown::Read).unwrap();
    let handle = spawn(session);
    keyboard.write_all(b"HI\n").unwrap();

    let (end, _, _) = handle.join().unwrap();
    assert!(matches!(end, Err(SessionError::Send(_))));
    drop(peer);
}

/// Terminal output that takes a while for every write, like a slow tty.
struct SlowTerminal;

impl Write for SlowTerminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(2));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keep the socket full until the session goes away.
fn flood(mut peer: UnixStream) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let chunk = [0xC1u8; 4096];
        while peer.write_all(&chunk).is_ok() {}
    })
}

#[test]
fn test_interrupt_during_flood() {
    let (socket, peer) = UnixStream::pair().unwrap();
    let (input, keyboard) = UnixStream::pair().unwrap();
    let (interrupt, mut trigger) = Interrupt::pair().unwrap();
    let mut session = Session::new(socket, Some(input), SlowTerminal, interrupt, cp037());

    let flooder = flood(peer);
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let end = session.run();
        let _ = tx.send(end);
    });

    thread::sleep(Duration::from_millis(200));
    let fired_at = Instant::now();
    trigger.fire().unwrap();

    let end = rx
        .recv_timeout(Duration::from_secs(3))
        .expect("session kept draining after the interrupt");
    assert_eq!(end.unwrap(), SessionEnd::Interrupted);
    assert!(fired_at.elapsed() < Duration::from_secs(1));

    flooder.join().unwrap();
    drop(keyboard);
}

#[test]
fn test_typed_line_is_sent_during_flood() {
    let (socket, peer) = UnixStream::pair().unwrap();
    let (input, mut keyboard) = UnixStream::pair().unwrap();
    let (interrupt, mut trigger) = Interrupt::pair().unwrap();
    let mut session = Session::new(socket, Some(input), SlowTerminal, interrupt, cp037());

    let mut reader = peer.try_clone().unwrap();
    let flooder = flood(peer);
    let handle = thread::spawn(move || session.run());

    keyboard.write_all(b"HI\n").unwrap();
    assert_eq!(read_from_peer(&mut reader, 3), vec![0xC8, 0xC9, 0x15]);

    trigger.fire().unwrap();
    assert_eq!(handle.join().unwrap().unwrap(), SessionEnd::Interrupted);
    drop(reader);
    flooder.join().unwrap();
}

/// Terminal input whose descriptor is not open.
struct ClosedInput;

impl Read for ClosedInput {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::from_raw_os_error(libc::EBADF))
    }
}

impl AsRawFd for ClosedInput {
    fn as_raw_fd(&self) -> RawFd {
        // Far above any descriptor a test process opens; poll reports POLLNVAL
        1 << 20
    }
}

#[test]
fn test_closed_input_falls_back_to_receive_only() {
    let (socket, mut peer) = UnixStream::pair().unwrap();
    let (interrupt, _trigger) = Interrupt::pair().unwrap();
    let mut session = Session::new(socket, Some(ClosedInput), Vec::new(), interrupt, cp037());

    let handle = thread::spawn(move || {
        let end = session.run();
        (end, session.into_output())
    });

    thread::sleep(Duration::from_millis(50));
    peer.write_all(&[0xD6, 0xD2]).unwrap();
    drop(peer);

    let (end, output) = handle.join().unwrap();
    assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
    assert_eq!(output, b"OK");
}
