//! Command-line interface for ssh-session.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Remote host.
    pub host: Option<String>,
    /// Commands to run, in order.
    pub commands: Vec<String>,
    /// Remote user.
    pub user: Option<String>,
    /// Remote port.
    pub port: Option<u16>,
    /// Private key file.
    pub identity: Option<PathBuf>,
    /// Extra `-o KEY=VALUE` options for the ssh client.
    pub options: Vec<(String, String)>,
    /// Per-command timeout in seconds.
    pub timeout: Option<u64>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Run against a local shell instead of ssh.
    pub local: bool,
    /// Spawn a fresh process per command.
    pub per_command: bool,
    /// Stop after the first failing command.
    pub break_on_failure: bool,
    /// Print results as JSON.
    pub json: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('u') | Long("user") => {
                result.user = Some(parser.value()?.parse()?);
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('i') | Long("identity") => {
                result.identity = Some(parser.value()?.parse()?);
            }
            Short('o') | Long("option") => {
                let value: String = parser.value()?.parse()?;
                let (key, val) = value
                    .split_once('=')
                    .filter(|(key, _)| !key.is_empty())
                    .ok_or_else(|| ArgsError::InvalidValue("option", value.clone()))?;
                result.options.push((key.to_string(), val.to_string()));
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| ArgsError::InvalidValue("timeout", value))?;
                result.timeout = Some(secs);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("local") => {
                result.local = true;
            }
            Long("per-command") => {
                result.per_command = true;
            }
            Long("break") => {
                result.break_on_failure = true;
            }
            Long("json") => {
                result.json = true;
            }
            Value(val) => {
                let val = into_string(val)?;
                let mut rest = parser.raw_args()?.peekable();
                if result.local {
                    result.commands.push(val);
                } else {
                    result.host = Some(val);
                    if rest.peek().and_then(|arg| arg.to_str()) == Some("--") {
                        rest.next();
                    }
                }
                // Everything after the host is a command, dashes included
                for arg in rest {
                    result.commands.push(into_string(arg)?);
                }
                break;
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn into_string(arg: OsString) -> Result<String, ArgsError> {
    arg.into_string()
        .map_err(|v| ArgsError::UnexpectedArgument(v.to_string_lossy().into()))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"ssh-session {version}
Run commands over a persistent ssh shell session

USAGE:
    ssh-session [OPTIONS] <HOST> [COMMAND]...
    ssh-session [OPTIONS] --local [COMMAND]...

OPTIONS:
    -u, --user <USER>         Remote user [default: $USER]
    -p, --port <PORT>         Remote port
    -i, --identity <FILE>     Private key file
    -o, --option <KEY=VALUE>  ssh client option (repeatable)
    -t, --timeout <SECS>      Per-command timeout in seconds
    -c, --config <FILE>       Path to configuration file (JSON)
    -l, --log-level <LVL>     Log level (error, warn, info, debug, trace)
        --local               Run commands in a local shell
        --per-command         Spawn a fresh shell for every command
        --break               Stop after the first failing command
        --json                Print results as JSON
    -h, --help                Print help
    -V, --version             Print version

Options go before the host. Every argument after the host is a command,
taken verbatim, so quote each command as one argument: `host ls -la` runs
`ls` and then `-la`. With --local there is no host and the first positional
argument starts the commands.

ENVIRONMENT VARIABLES:
    SSH_SESSION_HOST          Remote host (overrides config)
    SSH_SESSION_USER          Remote user (overrides config)
    SSH_SESSION_PORT          Remote port (overrides config)
    SSH_SESSION_PASSWORD      Password answered at the login prompt
    SSH_SESSION_TIMEOUT       Per-command timeout in seconds
    SSH_SESSION_LOG_LEVEL     Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # Run two commands on a remote host
    ssh-session -u deploy example.com "uname -a" "df -h"

    # Stop at the first failure, 30 second limit per command
    ssh-session --break -t 30 example.com "test -d /srv/app" "ls /srv/app"

    # Local shell, JSON output
    ssh-session --local --json "cd /tmp" pwd
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("ssh-session {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
