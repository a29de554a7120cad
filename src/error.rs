//! Error types for netebcdicat
//!
//! Errors are grouped by the phase that raises them: configuration (before any
//! I/O), connection establishment, and the running session. Every error is
//! fatal to the process; transient "would block" conditions never surface as
//! errors at all.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for a running bridge
///
/// Configuration errors never reach this type: they are reported as usage
/// errors by the command line front-end before the bridge starts.
#[derive(Debug)]
pub enum BridgeError {
    /// Listening, accepting or connecting failed
    Network(NetworkError),
    /// The established session failed
    Session(SessionError),
}

/// Configuration errors, detected before any network activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Code page name not in the built-in registry
    UnknownCodePage { name: String, available: Vec<String> },
    /// Neither `--listen` nor a remote host was given
    MissingTarget,
    /// Both `--listen` and a remote host were given
    ConflictingTarget { host: String },
    /// No port was given
    MissingPort,
    /// Port is not a number in 1..=65535
    InvalidPort { value: String },
    /// Extra positional argument
    UnexpectedArgument { value: String },
}

/// Connection establishment errors
#[derive(Debug)]
pub enum NetworkError {
    /// Could not bind the listening socket
    Bind { addr: String, source: io::Error },
    /// Waiting for or accepting the incoming connection failed
    Accept { addr: String, source: io::Error },
    /// Host name did not resolve to any address
    Resolve { host: String, port: u16, source: io::Error },
    /// Outbound connection failed
    Connect { host: String, port: u16, source: io::Error },
}

/// Errors that end a running session
#[derive(Debug)]
pub enum SessionError {
    /// Readiness wait failed
    Poll(io::Error),
    /// Receiving from the peer failed (reset, etc.)
    Receive(io::Error),
    /// Sending to the peer failed (broken pipe, etc.)
    Send(io::Error),
    /// Reading the local terminal failed
    Input(io::Error),
    /// Writing the local terminal failed
    Output(io::Error),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Network(err) => write!(f, "Network error: {err}"),
            BridgeError::Session(err) => write!(f, "Session error: {err}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownCodePage { name, available } => write!(
                f,
                "unknown code page '{name}' (available: {})",
                available.join(", ")
            ),
            ConfigError::MissingTarget => {
                write!(f, "one of --listen or a remote host address is required")
            }
            ConfigError::ConflictingTarget { host } => {
                write!(f, "--listen cannot be combined with a remote host ('{host}')")
            }
            ConfigError::MissingPort => write!(f, "a port is required"),
            ConfigError::InvalidPort { value } => {
                write!(f, "invalid port '{value}': expected a number from 1 to 65535")
            }
            ConfigError::UnexpectedArgument { value } => {
                write!(f, "unexpected argument '{value}'")
            }
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Bind { addr, source } => write!(f, "cannot listen on {addr}: {source}"),
            NetworkError::Accept { addr, source } => {
                write!(f, "accepting a connection on {addr} failed: {source}")
            }
            NetworkError::Resolve { host, port, source } => {
                write!(f, "cannot resolve {host}:{port}: {source}")
            }
            NetworkError::Connect { host, port, source } => {
                write!(f, "cannot connect to {host}:{port}: {source}")
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Poll(err) => write!(f, "waiting for input failed: {err}"),
            SessionError::Receive(err) => write!(f, "receive failed: {err}"),
            SessionError::Send(err) => write!(f, "send failed: {err}"),
            SessionError::Input(err) => write!(f, "reading standard input failed: {err}"),
            SessionError::Output(err) => write!(f, "writing to the terminal failed: {err}"),
        }
    }
}

impl StdError for BridgeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BridgeError::Network(err) => Some(err),
            BridgeError::Session(err) => Some(err),
        }
    }
}

impl StdError for ConfigError {}

impl StdError for NetworkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            NetworkError::Bind { source, .. }
            | NetworkError::Accept { source, .. }
            | NetworkError::Resolve { source, .. }
            | NetworkError::Connect { source, .. } => Some(source),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.io_error())
    }
}

impl SessionError {
    /// The underlying OS error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            SessionError::Poll(err)
            | SessionError::Receive(err)
            | SessionError::Send(err)
            | SessionError::Input(err)
            | SessionError::Output(err) => err,
        }
    }
}

impl From<NetworkError> for BridgeError {
    fn from(err: NetworkError) -> Self {
        BridgeError::Network(err)
    }
}

impl From<SessionError> for BridgeError {
    fn from(err: SessionError) -> Self {
        BridgeError::Session(err)
    }
}

/// Result type alias for netebcdicat operations
pub type BridgeResult<T> = Result<T, BridgeError>;

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type NetworkResult<T> = Result<T, NetworkError>;
pub type SessionResult<T> = Result<T, SessionError>;
