//! Wiring: connection establishment followed by the session loop

use std::io;

use crate::config::BridgeConfig;
use crate::connection;
use crate::error::BridgeResult;
use crate::input::RawStdin;
use crate::interrupt::Interrupt;
use crate::session::{Session, SessionEnd};

/// Establish the connection described by `config` and bridge it to the
/// process's standard input and output until the session ends.
///
/// `input` of `None` (standard input closed at startup) runs receive-only.
pub fn run(
    config: &BridgeConfig,
    input: Option<RawStdin>,
    interrupt: Interrupt,
) -> BridgeResult<SessionEnd> {
    let Some(connection) = connection::establish(&config.mode, &interrupt)? else {
        return Ok(SessionEnd::Interrupted);
    };
    log::info!("Session established ({connection}), code page {}", config.codepage);

    let mut session = Session::new(
        connection.into_stream(),
        input,
        io::stdout(),
        interrupt,
        config.codepage,
    );
    let end = session.run()?;

    let stats = session.stats();
    log::info!(
        "Session ended: {} ({} bytes received, {} bytes in {} lines sent)",
        end.describe(),
        stats.bytes_received,
        stats.bytes_sent,
        stats.lines_sent
    );
    if stats.bytes_replaced > 0 || stats.chars_substituted > 0 {
        log::warn!(
            "{} unmapped byte(s) received, {} unrepresentable character(s) sent",
            stats.bytes_replaced,
            stats.chars_substituted
        );
    }
    Ok(end)
}
