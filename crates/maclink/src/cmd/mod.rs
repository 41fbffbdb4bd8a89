use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use maclink_socket::{Endpoint, DEFAULT_COMMAND_ENDPOINT, DEFAULT_NOTIFY_ENDPOINT};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod listen;
pub mod load;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one JSON command and print the reply.
    Call(CallArgs),
    /// Load a grammar and its lists from a file.
    Load(LoadArgs),
    /// Subscribe to notifications and print them.
    Listen(ListenArgs),
    /// Run a stub service that acknowledges and republishes commands.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::Load(args) => load::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Command endpoint.
    #[arg(long, env = "MACLINK_CMD_ENDPOINT", default_value = DEFAULT_COMMAND_ENDPOINT)]
    pub endpoint: Endpoint,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms). Default: wait forever.
    #[arg(long)]
    pub timeout: Option<String>,
    /// Reject requests that are not a known grammar command.
    #[arg(long)]
    pub check: bool,
    /// JSON request, e.g. '{"cmd":"g.show"}'.
    pub request: String,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Command endpoint.
    #[arg(long, env = "MACLINK_CMD_ENDPOINT", default_value = DEFAULT_COMMAND_ENDPOINT)]
    pub endpoint: Endpoint,
    /// Maximum time to wait for each reply (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Check the file and print the commands without sending them.
    #[arg(long)]
    pub dry_run: bool,
    /// Load file: {"grammar": {...}, "lists": {"name": [...]}}.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Notification endpoint.
    #[arg(long, env = "MACLINK_PUB_ENDPOINT", default_value = DEFAULT_NOTIFY_ENDPOINT)]
    pub endpoint: Endpoint,
    /// Only print messages whose topic starts with this prefix.
    #[arg(long)]
    pub topic: Option<String>,
    /// Exit after printing N messages.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
    /// Silence before the first keepalive probe.
    #[arg(long, default_value = "3000ms", conflicts_with = "no_keepalive")]
    pub idle: String,
    /// Silence between keepalive probes.
    #[arg(long, default_value = "1000ms", conflicts_with = "no_keepalive")]
    pub interval: String,
    /// Unanswered probes before the publisher is declared dead.
    #[arg(long, default_value_t = 3, conflicts_with = "no_keepalive")]
    pub probes: u32,
    /// Disable keepalive probing.
    #[arg(long)]
    pub no_keepalive: bool,
    /// Reconnect after failures, waiting this long between attempts.
    #[arg(long, value_name = "DELAY")]
    pub reconnect: Option<String>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Command endpoint to bind.
    #[arg(long, env = "MACLINK_CMD_ENDPOINT", default_value = DEFAULT_COMMAND_ENDPOINT)]
    pub cmd_endpoint: Endpoint,
    /// Notification endpoint to bind.
    #[arg(long, env = "MACLINK_PUB_ENDPOINT", default_value = DEFAULT_NOTIFY_ENDPOINT)]
    pub pub_endpoint: Endpoint,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn parse_optional_duration(input: Option<&str>) -> CliResult<Option<Duration>> {
    input.map(parse_duration).transpose()
}

pub(crate) fn install_ctrlc_handler(cancel: maclink_socket::CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel()).map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
