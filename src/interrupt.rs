//! User interrupt as a pollable descriptor
//!
//! SIGINT and SIGTERM are routed into one end of a Unix socket pair; the
//! other end sits in the session's poll set. An interrupt wakes the blocking
//! wait and the loop ends on its next iteration. A second signal while the
//! first is still unhandled (for example during a slow outbound connect)
//! terminates the process immediately.

use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::SigId;

use crate::poller;

/// Signals treated as a request to stop.
pub const STOP_SIGNALS: [libc::c_int; 2] = [SIGINT, SIGTERM];

/// Exit status used when a second stop signal arrives.
pub const FORCED_EXIT_STATUS: i32 = 130;

/// Read end of the interrupt channel.
#[derive(Debug)]
pub struct Interrupt {
    receiver: UnixStream,
    registrations: Vec<SigId>,
}

/// Write end of an interrupt channel created with [`Interrupt::pair`].
#[derive(Debug)]
pub struct InterruptTrigger {
    sender: UnixStream,
}

impl Interrupt {
    /// Route the stop signals into a new interrupt channel.
    pub fn install() -> io::Result<Self> {
        let (receiver, sender) = UnixStream::pair()?;
        let armed = Arc::new(AtomicBool::new(false));
        let mut registrations = Vec::with_capacity(STOP_SIGNALS.len() * 3);

        for signal in STOP_SIGNALS {
            // Order matters: the shutdown hook must see the flag from the
            // previous delivery, not this one.
            registrations.push(signal_hook::flag::register_conditional_shutdown(
                signal,
                FORCED_EXIT_STATUS,
                Arc::clone(&armed),
            )?);
            registrations.push(signal_hook::flag::register(signal, Arc::clone(&armed))?);
            registrations.push(signal_hook::low_level::pipe::register(
                signal,
                sender.try_clone()?,
            )?);
        }

        log::debug!("interrupt handlers installed for {STOP_SIGNALS:?}");
        Ok(Self {
            receiver,
            registrations,
        })
    }

    /// An interrupt channel not tied to any signal.
    pub fn pair() -> io::Result<(Self, InterruptTrigger)> {
        let (receiver, sender) = UnixStream::pair()?;
        Ok((
            Self {
                receiver,
                registrations: Vec::new(),
            },
            InterruptTrigger { sender },
        ))
    }

    /// Whether an interrupt is waiting, without blocking.
    pub fn is_pending(&self) -> io::Result<bool> {
        let [ready] = poller::wait_readable([Some(self.as_raw_fd())], Some(Duration::ZERO))?;
        Ok(ready)
    }
}

impl AsRawFd for Interrupt {
    fn as_raw_fd(&self) -> RawFd {
        self.receiver.as_raw_fd()
    }
}

impl Drop for Interrupt {
    fn drop(&mut self) {
        for id in self.registrations.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

impl InterruptTrigger {
    /// Request an interrupt.
    pub fn fire(&mut self) -> io::Result<()> {
        self.sender.write_all(&[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_makes_interrupt_pending() {
        let (interrupt, mut trigger) = Interrupt::pair().unwrap();
        assert!(!interrupt.is_pending().unwrap());
        trigger.fire().unwrap();
        assert!(interrupt.is_pending().unwrap());
    }

    #[test]
    fn test_dropped_trigger_counts_as_interrupt() {
        let (interrupt, trigger) = Interrupt::pair().unwrap();
        drop(trigger);
        assert!(interrupt.is_pending().unwrap());
    }
}
