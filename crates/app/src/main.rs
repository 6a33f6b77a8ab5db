mod console;

use std::fmt;
use std::sync::Arc;

use quiz_core::model::{Mode, ModeError};
use services::{
    BackendConfig, HttpQuizBackend, InMemoryBackend, QuizBackend, QuizRun, RunConfig, RunDriver,
};
use tracing_subscriber::EnvFilter;

use crate::console::{ConsoleUi, forward_input};

const DEFAULT_LOG_FILTER: &str = "services=info,app=info";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingMode,
    InvalidMode(ModeError),
    InvalidDuration { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingMode => write!(f, "play requires a mode"),
            ArgsError::InvalidMode(err) => write!(f, "{err}"),
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p app -- play <mode> [--base-url <url>] [--cookie <value>] [--duration <secs>] [--offline]"
    );
    eprintln!("  cargo run -p app -- modes");
    eprintln!();
    eprintln!("Modes: adaptive, challenger, minuterush, firststrike, levelinfinity");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_BASE_URL, QUIZ_SESSION_COOKIE, QUIZ_HTTP_TIMEOUT_SECS");
    eprintln!("  QUIZ_TICK_MS, QUIZ_FEEDBACK_DELAY_MS, QUIZ_FINISH_DELAY_MS, QUIZ_ERROR_DELAY_MS");
    eprintln!("  QUIZ_DEFAULT_RUN_SECS, QUIZ_INITIAL_DIFFICULTY, QUIZ_ON_SUBMIT_ERROR");
    eprintln!("  RUST_LOG (default {DEFAULT_LOG_FILTER})");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Modes,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "modes" => Some(Self::Modes),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct PlayArgs {
    mode: Mode,
    base_url: Option<String>,
    cookie: Option<String>,
    duration: Option<i64>,
    offline: bool,
}

impl PlayArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut mode = None;
        let mut base_url = None;
        let mut cookie = None;
        let mut duration = None;
        let mut offline = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--base-url" => base_url = Some(require_value(args, "--base-url")?),
                "--cookie" => cookie = Some(require_value(args, "--cookie")?),
                "--duration" => {
                    let value = require_value(args, "--duration")?;
                    let secs = value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ArgsError::InvalidDuration { raw: value.clone() })?;
                    duration = Some(secs);
                }
                "--offline" => offline = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if other.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                other if mode.is_none() => {
                    mode = Some(other.parse::<Mode>().map_err(ArgsError::InvalidMode)?);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            mode: mode.ok_or(ArgsError::MissingMode)?,
            base_url,
            cookie,
            duration,
            offline,
        })
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_backend(args: &PlayArgs) -> Result<Arc<dyn QuizBackend>, Box<dyn std::error::Error>> {
    if args.offline {
        tracing::info!("playing against the built-in question bank");
        return Ok(Arc::new(InMemoryBackend::with_sample_bank()));
    }

    let mut config = BackendConfig::from_env()?;
    if let Some(raw) = &args.base_url {
        config.base_url = BackendConfig::new(raw)?.base_url;
    }
    if let Some(cookie) = &args.cookie {
        config = config.with_session_cookie(cookie.clone());
    }
    tracing::info!(base_url = %config.base_url, "using remote scoring server");
    Ok(Arc::new(HttpQuizBackend::new(config)?))
}

async fn play(args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let backend = build_backend(&args)?;
    let config = RunConfig::from_env();
    let ui = Arc::new(ConsoleUi::new(args.duration, config.default_run_secs));

    let run = QuizRun::new(backend, ui.clone()).with_config(config);
    let (driver, handle) = RunDriver::new(run);
    let input = tokio::spawn(forward_input(ui, handle));

    println!("== {} ==", args.mode.label());
    let result = driver.run(args.mode).await;
    input.abort();

    let summary = result?;
    println!();
    println!(
        "{} finished ({}): score {}, {} answered",
        summary.mode.label(),
        summary.reason,
        summary.score,
        summary.answered
    );
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    match cmd {
        Command::Modes => {
            for mode in Mode::ALL {
                println!("{:<14} {}", mode.as_str(), mode.label());
            }
            Ok(())
        }
        Command::Play => {
            let args = PlayArgs::parse(&mut argv).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            play(args).await
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            2
        }
    };
    // The stdin reader may still be parked on a blocking read.
    std::process::exit(code);
}
