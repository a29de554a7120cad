//! netebcdicat entry point
//!
//! Parses the command line, sets up logging and the interrupt channel, then
//! hands over to the bridge. Exit status: 0 after a graceful end (peer closed
//! or user interrupt), 1 after a network or session failure, 2 for usage
//! errors.

use std::io::Write;

use anyhow::Context;
use log::LevelFilter;

use netebcdicat::bridge;
use netebcdicat::cli;
use netebcdicat::config::BridgeConfig;
use netebcdicat::input::RawStdin;
use netebcdicat::interrupt::Interrupt;
use netebcdicat::session::SessionEnd;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let config = cli::parse();
    init_logging(config.log_level);

    log::info!("netebcdicat version {VERSION}");
    log::debug!("{config:?}");
    log::info!(
        "EBCDIC code page: {} ({}), also known as {}",
        config.codepage,
        config.codepage.description(),
        config.codepage.aliases().join(", ")
    );

    // Before any socket exists, so descriptor 0 cannot be reused.
    let input = RawStdin::open();

    let code = match run(&config, input) {
        Ok(end) => {
            log::info!("{}", end.describe());
            println!("End of Line");
            0
        }
        Err(e) => {
            log::error!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(config: &BridgeConfig, input: Option<RawStdin>) -> anyhow::Result<SessionEnd> {
    let interrupt = Interrupt::install().context("failed to install signal handlers")?;
    let end = bridge::run(config, input, interrupt)?;
    Ok(end)
}

fn init_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "netebcdicat:{}:{}", record.level(), record.args()))
        .init();
}
