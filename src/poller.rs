//! Readiness multiplexing over a small fixed set of descriptors
//!
//! Thin wrappers over `poll(2)` and `recv(2)`. The descriptors themselves stay
//! in blocking mode; non-blocking behavior is requested per call instead
//! (zero timeout for `poll`, `MSG_DONTWAIT` for `recv`).

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Events that make a descriptor worth servicing. Hang-up and error
/// conditions count as ready so the following read reports them.
const READY_EVENTS: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

/// Block until at least one descriptor is readable.
///
/// `None` entries are skipped. `timeout` of `None` waits forever. The result
/// has one flag per input slot. A signal interrupting the wait is reported as
/// "nothing ready" so the caller can inspect its own state and wait again.
pub fn wait_readable<const N: usize>(
    fds: [Option<RawFd>; N],
    timeout: Option<Duration>,
) -> io::Result<[bool; N]> {
    let mut pollfds = fds.map(|fd| libc::pollfd {
        // poll ignores negative descriptors
        fd: fd.unwrap_or(-1),
        events: libc::POLLIN,
        revents: 0,
    });

    let timeout_ms = match timeout {
        Some(duration) => duration.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        None => -1,
    };

    let ret = unsafe { libc::poll(pollfds.as_mut_ptr(), N as libc::nfds_t, timeout_ms) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok([false; N]);
        }
        return Err(err);
    }

    Ok(pollfds.map(|pollfd| pollfd.fd >= 0 && pollfd.revents & READY_EVENTS != 0))
}

/// Receive without blocking, regardless of the socket's mode.
///
/// Returns `ErrorKind::WouldBlock` when nothing is queued and `Ok(0)` on an
/// orderly shutdown by the peer.
pub fn recv_nonblocking(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe {
        libc::recv(
            fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
            libc::MSG_DONTWAIT,
        )
    };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}
