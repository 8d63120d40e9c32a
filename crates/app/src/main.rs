mod console;
mod demo;
mod logging;

use std::fmt;
use std::sync::Arc;

use backend::{ExamBackend, HttpBackend, HttpBackendConfig};
use exam_core::model::ExamId;
use services::{Clock, EngineConfig, ExamSessionEngine, SessionPhase};
use tracing::info;
use url::Url;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidExamId { raw: String },
    InvalidApiUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidExamId { raw } => write!(f, "invalid --exam-id value: {raw}"),
            ArgsError::InvalidApiUrl { raw } => write!(f, "invalid --api value: {raw}"),
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
    eprintln!("  cargo run -p app -- [--exam-id <id>] [--api <base_url>] [--demo]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --exam-id 1");
    eprintln!("  the built-in demo exam when no API base URL is configured");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_ID, EXAM_API_BASE_URL, EXAM_API_TOKEN");
    eprintln!("  EXAM_AUTOSAVE_SECS, EXAM_DEBOUNCE_MS, EXAM_SAVE_MAX_ATTEMPTS, EXAM_SAVE_BACKOFF_MS");
    eprintln!("  RUST_LOG (default: app=info,services=info)");
}

struct Args {
    exam_id: ExamId,
    api: Option<Url>,
    demo: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut exam_id = std::env::var("EXAM_ID")
            .ok()
            .and_then(|value| value.trim().parse::<ExamId>().ok())
            .unwrap_or_else(|| ExamId::new(1));
        let mut api = None;
        let mut demo = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--exam-id" => {
                    let value = require_value(args, "--exam-id")?;
                    exam_id = value
                        .trim()
                        .parse()
                        .map_err(|_| ArgsError::InvalidExamId { raw: value.clone() })?;
                }
                "--api" => {
                    let value = require_value(args, "--api")?;
                    let url = Url::parse(value.trim())
                        .map_err(|_| ArgsError::InvalidApiUrl { raw: value.clone() })?;
                    api = Some(url);
                }
                "--demo" => demo = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { exam_id, api, demo })
    }
}

fn build_backend(
    args: &Args,
    clock: &Clock,
) -> Result<Arc<dyn ExamBackend>, Box<dyn std::error::Error>> {
    if !args.demo {
        let from_env = HttpBackendConfig::from_env();
        let config = match (&args.api, from_env) {
            (Some(url), env) => {
                let config = HttpBackendConfig::new(url.clone());
                match env.and_then(|c| c.token) {
                    Some(token) => Some(config.with_token(token)),
                    None => Some(config),
                }
            }
            (None, env) => env,
        };
        if let Some(config) = config {
            info!(base_url = %config.base_url, "using exam API");
            return Ok(Arc::new(HttpBackend::new(config)));
        }
    }

    info!("using the built-in demo exam");
    Ok(Arc::new(demo::seeded_backend(args.exam_id, clock)?))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = Clock::default();
    let backend = build_backend(&args, &clock)?;
    let config = EngineConfig::from_env();

    let handle = ExamSessionEngine::spawn(backend, config, clock);
    handle.start(args.exam_id)?;
    let view = handle
        .wait_for(|v| v.phase != SessionPhase::Idle && v.phase != SessionPhase::Starting)
        .await?;
    if view.phase == SessionPhase::Failed {
        return Err(view
            .error
            .unwrap_or_else(|| "exam could not start".into())
            .into());
    }

    let result = console::run(&handle).await;
    if handle.view().phase != SessionPhase::Submitted {
        println!("leaving the exam; your saved progress stays on the server");
    }
    if handle.unmount().is_ok() {
        handle.closed().await;
    }
    result
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
