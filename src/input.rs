//! Terminal input: raw standard input and line assembly
//!
//! Standard input is read straight from descriptor 0. Going through
//! `std::io::stdin()` would put a userspace buffer between the kernel and
//! the poll loop, and `poll(2)` would then miss lines already sitting in that
//! buffer.

use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};

/// Unbuffered reader over the process's standard input descriptor.
#[derive(Debug, Clone, Copy)]
pub struct RawStdin {
    _private: (),
}

impl RawStdin {
    /// Claim standard input, or `None` if descriptor 0 is not open.
    ///
    /// Call this before creating any socket. A process started with fd 0
    /// closed would otherwise hand that number to the next descriptor it
    /// opens, and reading "standard input" would read that socket instead.
    pub fn open() -> Option<Self> {
        if fd_is_open(libc::STDIN_FILENO) {
            Some(Self { _private: () })
        } else {
            log::warn!("standard input is closed, running receive-only");
            None
        }
    }
}

fn fd_is_open(fd: RawFd) -> bool {
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

impl Read for RawStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

impl AsRawFd for RawStdin {
    fn as_raw_fd(&self) -> RawFd {
        libc::STDIN_FILENO
    }
}

/// Collects raw input bytes and hands out complete lines.
///
/// A line ends at `\n`; a `\r` right before it is dropped too. Bytes after
/// the last newline are held until the rest of the line arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Take the next complete line, without its line ending.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take whatever is left of an unterminated line, if anything.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest);
        Some(String::from_utf8_lossy(rest).into_owned())
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
