//! Validated runtime configuration
//!
//! The command line front-end hands over raw flags and positionals; this
//! module turns them into a [`BridgeConfig`] or a [`ConfigError`]. Nothing
//! here touches the network, so every configuration error is reported before
//! a socket is created.

use std::fmt;

use log::LevelFilter;

use crate::codepage::CodePage;
use crate::error::{ConfigError, ConfigResult};

/// How the TCP session is established
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Bind to all interfaces and accept a single connection
    Listen { port: u16 },
    /// Open a single outbound connection
    Connect { host: String, port: u16 },
}

impl Mode {
    pub fn port(&self) -> u16 {
        match self {
            Mode::Listen { port } | Mode::Connect { port, .. } => *port,
        }
    }

    pub fn is_listen(&self) -> bool {
        matches!(self, Mode::Listen { .. })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Listen { port } => write!(f, "listen on 0.0.0.0:{port}"),
            Mode::Connect { host, port } => write!(f, "connect to {host}:{port}"),
        }
    }
}

/// Everything the bridge needs to run
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mode: Mode,
    pub codepage: &'static CodePage,
    pub log_level: LevelFilter,
}

impl BridgeConfig {
    /// Build a configuration from the raw command line pieces.
    ///
    /// `positionals` holds `[port]` in listen mode and `[host, port]` in
    /// connect mode.
    pub fn from_parts(
        listen: bool,
        positionals: &[String],
        codepage: &'static CodePage,
        log_level: LevelFilter,
    ) -> ConfigResult<Self> {
        let mode = resolve_mode(listen, positionals)?;
        Ok(Self {
            mode,
            codepage,
            log_level,
        })
    }
}

fn resolve_mode(listen: bool, positionals: &[String]) -> ConfigResult<Mode> {
    match (listen, positionals) {
        (_, [_, _, extra, ..]) => Err(ConfigError::UnexpectedArgument {
            value: extra.clone(),
        }),
        (_, []) => Err(ConfigError::MissingPort),
        (true, [port]) => Ok(Mode::Listen {
            port: parse_port(port)?,
        }),
        (true, [host, _]) => Err(ConfigError::ConflictingTarget { host: host.clone() }),
        (false, [_]) => Err(ConfigError::MissingTarget),
        (false, [host, port]) => {
            let host = host.trim();
            if host.is_empty() {
                return Err(ConfigError::MissingTarget);
            }
            Ok(Mode::Connect {
                host: host.to_string(),
                port: parse_port(port)?,
            })
        }
    }
}

/// Parse a TCP port, rejecting 0.
pub fn parse_port(value: &str) -> ConfigResult<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            value: value.to_string(),
        }),
    }
}

/// Logging level for the verbosity flags. `--debug` wins over `--verbose`.
pub fn log_level(debug: bool, verbose: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    }
}
