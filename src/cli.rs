//! Command line front-end

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::codepage::{self, CodePage};
use crate::config::{self, BridgeConfig};
use crate::error::{ConfigError, ConfigResult};

const ABOUT: &str = "Talk to hosts that only speak EBCDIC, e.g. netcat on z/OS UNIX System Services";

const EXAMPLES: &str = "\
Examples:
  netebcdicat -c cp500 -l 54321
  netebcdicat -d 1.1.0.1 12345";

#[derive(Debug, Parser)]
#[command(
    name = "netebcdicat",
    version,
    about = ABOUT,
    override_usage = "netebcdicat [OPTIONS] <--listen | IP> <PORT>",
    after_help = EXAMPLES
)]
pub struct Args {
    /// Print lots of debugging statements
    #[arg(short, long)]
    pub debug: bool,

    /// Be verbose
    #[arg(short, long)]
    pub verbose: bool,

    /// EBCDIC code page (cp037, cp500, cp1047)
    #[arg(
        short,
        long,
        value_name = "NAME",
        default_value = codepage::DEFAULT_CODEPAGE,
        value_parser = parse_codepage
    )]
    pub codepage: &'static CodePage,

    /// Listen for an incoming connection instead of connecting out
    #[arg(short, long)]
    pub listen: bool,

    /// Remote host address (omitted with --listen) followed by the port
    #[arg(value_name = "TARGET", num_args = 1..=2, required = true)]
    pub targets: Vec<String>,
}

impl Args {
    pub fn into_config(self) -> ConfigResult<BridgeConfig> {
        BridgeConfig::from_parts(
            self.listen,
            &self.targets,
            self.codepage,
            config::log_level(self.debug, self.verbose),
        )
    }
}

fn parse_codepage(name: &str) -> Result<&'static CodePage, ConfigError> {
    codepage::lookup(name)
}

/// Turn a configuration error into the same kind of usage error clap
/// reports for malformed arguments.
pub fn usage_error(err: &ConfigError) -> clap::Error {
    let kind = match err {
        ConfigError::UnknownCodePage { .. } | ConfigError::InvalidPort { .. } => {
            ErrorKind::InvalidValue
        }
        ConfigError::MissingTarget | ConfigError::MissingPort => ErrorKind::MissingRequiredArgument,
        ConfigError::ConflictingTarget { .. } => ErrorKind::ArgumentConflict,
        ConfigError::UnexpectedArgument { .. } => ErrorKind::UnknownArgument,
    };
    Args::command().error(kind, err)
}

/// Parse the process arguments into a validated configuration, exiting with
/// a usage message on any error.
pub fn parse() -> BridgeConfig {
    match Args::parse().into_config() {
        Ok(config) => config,
        Err(err) => usage_error(&err).exit(),
    }
}
