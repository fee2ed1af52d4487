use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use logicrpc_transport::DEFAULT_SOCKET_PATH;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Call one method on a backend module and print the reply.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Backend module to address.
    pub module_id: String,
    /// Method within the module.
    pub method: String,
    /// Params as a JSON object.
    #[arg(long, conflicts_with = "params_file")]
    pub params: Option<String>,
    /// Read params from a JSON file.
    #[arg(long, value_name = "PATH", conflicts_with = "params")]
    pub params_file: Option<PathBuf>,
    /// Session/origin tag forwarded to the backend.
    #[arg(long, default_value = "cli")]
    pub origin: String,
    /// Backend socket path.
    #[arg(long, env = "LOGICRPC_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// Delay before reconnecting after a transport fault (e.g. 5s, 250ms).
    #[arg(long, default_value = "5s")]
    pub retry_delay: String,
    /// Maximum attempts, including the first.
    #[arg(long, default_value_t = logicrpc_client::DEFAULT_MAX_ATTEMPTS)]
    pub attempts: u32,
    /// Overall call deadline (e.g. 30s, 500ms). Default: wait indefinitely.
    #[arg(long)]
    pub timeout: Option<String>,
    /// Schema directory for params/result validation.
    #[arg(long, value_name = "DIR")]
    pub schemas: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `250ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
