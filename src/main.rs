//! ssh-session binary entry point.

use std::process::ExitCode;

use ssh_session::cli::{self, Args};
use ssh_session::config::Config;
use ssh_session::{logging, CommandResult, MultiRunOptions};
use tracing::{error, info};

/// Exit code for usage and infrastructure errors.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'ssh-session --help' for more information.");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    logging::try_init_with(Some(config.log_filter())).ok();

    if args.commands.is_empty() {
        eprintln!("error: no commands given");
        return ExitCode::from(EXIT_USAGE);
    }

    match run(&args, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Run every command. `Ok(false)` if any of them failed.
fn run(args: &Args, config: &Config) -> ssh_session::Result<bool> {
    let mut session = config.build_session()?;
    info!("ssh-session v{}", env!("CARGO_PKG_VERSION"));
    session.open()?;

    let options = MultiRunOptions::new().break_on_failure(args.break_on_failure);
    let json = args.json;
    let results = session.run_multiple_with(&args.commands, options, |result| {
        if !json {
            print_result(result);
        }
    })?;
    session.close()?;

    if json {
        let value = serde_json::Value::Array(results.iter().map(CommandResult::to_structured).collect());
        println!("{:#}", value);
    }

    Ok(results.iter().all(CommandResult::success))
}

fn print_result(result: &CommandResult) {
    let output = result.output();
    print!("{}", output);
    if !output.is_empty() && !output.ends_with('\n') {
        println!();
    }
    eprintln!("{}", result);
}
