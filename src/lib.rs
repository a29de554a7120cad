//! netebcdicat: a netcat-style bridge between a UTF-8 terminal and a host
//! that only speaks EBCDIC.

/// CODEC: EBCDIC code page tables and text conversion
pub mod codepage;

/// Error types for configuration, connection and session failures
pub mod error;

/// Validated runtime configuration
pub mod config;

/// Command line front-end
pub mod cli;

/// NETWORK: listen-once or connect-once TCP establishment
pub mod connection;

/// INTEGRATION: `poll(2)` based readiness over a fixed descriptor set
pub mod poller;

/// Raw standard input and line assembly
pub mod input;

/// Interrupt signals as a pollable channel
pub mod interrupt;

/// Main session loop
pub mod session;

/// Connection plus session, wired to the process terminal
pub mod bridge;

pub use codepage::CodePage;
pub use config::{BridgeConfig, Mode};
pub use error::{BridgeError, BridgeResult};
pub use session::{Session, SessionEnd, SessionStats};
