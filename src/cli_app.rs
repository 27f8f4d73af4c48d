//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::control;
use serde_json::{Value, json};
use thiserror::Error;

use stack_outliner::core::config::Config;
use stack_outliner::core::errors::SolError;
use stack_outliner::logger::sink::sink_from_config;
use stack_outliner::outliner::chrome::{Decoded, RecordingChrome};
use stack_outliner::outliner::model::{EvaluationTarget, OutlinerMsg};
use stack_outliner::outliner::runtime::{OutlinerHost, StaticClient};
use stack_outliner::sync::map::RecordingMap;
use stack_outliner::sync::synchronizer::MapSynchronizer;
use stack_outliner::tree::decode::parse_response;
use stack_outliner::view::render::{TextOptions, render_text};
use stack_outliner::view::theme::ColorMode;

/// Stack outliner: decode, resolve and render evaluation result trees.
#[derive(Debug, Parser)]
#[command(
    name = "sol",
    author,
    version,
    about = "Stack outliner - render evaluation result trees",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Render a response payload as an outliner would show it.
    Render(RenderArgs),
    /// Decode a response payload and report inert nodes.
    Decode(DecodeArgs),
    /// View configuration state.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct RenderArgs {
    /// Response payload file, or `-` for stdin.
    payload: PathBuf,
    /// Set chip INDEX to VALUE before rendering (repeatable, applied in order).
    #[arg(long = "chip", value_name = "INDEX=VALUE", value_parser = parse_assignment)]
    chips: Vec<(i64, i64)>,
    /// Set choice chip INDEX to VALUE (repeatable, applied in order).
    #[arg(long = "choice", value_name = "INDEX=VALUE", value_parser = parse_assignment)]
    choices: Vec<(i64, i64)>,
    /// Toggle histogram bucket selection (repeatable, applied in order).
    #[arg(long = "toggle-bucket", value_name = "INDEX", allow_negative_numbers = true)]
    toggle_buckets: Vec<i64>,
    /// Print the map collaborator calls issued while rendering.
    #[arg(long)]
    trace_map: bool,
}

#[derive(Debug, Clone, Args)]
struct DecodeArgs {
    /// Response payload file, or `-` for stdin.
    payload: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<SolError> for CliError {
    fn from(err: SolError) -> Self {
        match err {
            SolError::InvalidConfig { .. }
            | SolError::MissingConfig { .. }
            | SolError::ConfigParse { .. }
            | SolError::Payload { .. } => Self::User(err.to_string()),
            SolError::Serialization { .. } | SolError::Render { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Render(args) => run_render(cli, args),
        Command::Decode(args) => run_decode(cli, args),
        Command::Config(args) => run_config(cli, args),
    }
}

// ──────────────────── render ────────────────────

fn run_render(cli: &Cli, args: &RenderArgs) -> Result<(), CliError> {
    let config = Arc::new(Config::load(cli.config.as_deref())?);
    let (response, report) = parse_response(&read_payload(&args.payload)?)?;
    let expression = response.expression.clone().unwrap_or_default();

    let sink = sink_from_config(&config.logging);
    let map = Arc::new(RecordingMap::new());
    let sync = MapSynchronizer::new(map.clone(), config.sync.clone(), sink.clone()).shared();
    let client = Arc::new(StaticClient::from_decoded(Decoded { response, report }));
    let chrome = Arc::new(RecordingChrome::new());
    let mut host = OutlinerHost::new(1, config.clone(), sync, sink, client, chrome);

    host.dispatch(OutlinerMsg::Evaluate(EvaluationTarget::Expression(expression)));
    host.run_until_idle();
    for &(index, value) in &args.chips {
        host.dispatch(OutlinerMsg::SetChip { index, value });
    }
    for &(index, value) in &args.choices {
        host.dispatch(OutlinerMsg::SetChoiceChip { index, value });
    }
    for &index in &args.toggle_buckets {
        host.dispatch(OutlinerMsg::ToggleBucket(index));
    }

    let stack = host.render();
    match output_mode(cli) {
        OutputMode::Human => {
            let color = if cli.no_color {
                ColorMode::Disabled
            } else if io::stdout().is_terminal() {
                ColorMode::from_environment()
            } else {
                ColorMode::Disabled
            };
            let opts = TextOptions {
                bar_width: config.render.bar_width,
                color,
            };
            let mut stdout = io::stdout().lock();
            write!(stdout, "{}", render_text(&stack, &opts))?;
            if args.trace_map {
                writeln!(stdout)?;
                writeln!(stdout, "map calls:")?;
                for call in map.calls() {
                    writeln!(stdout, "  {}", serde_json::to_string(&call)?)?;
                }
            }
            if !report.is_clean() {
                eprintln!(
                    "note: {} inert line(s), {} inert atom(s) decoded as placeholders",
                    report.inert_lines, report.inert_atoms
                );
            }
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "render",
                "stack": serde_json::to_value(&stack)?,
                "report": serde_json::to_value(report)?,
                "chips": serde_json::to_value(host.model().state.chip_values())?,
                "selected_bucket": host.model().selected_bucket(),
            });
            if args.trace_map {
                payload["map_calls"] = serde_json::to_value(map.calls())?;
            }
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── decode ────────────────────

fn run_decode(cli: &Cli, args: &DecodeArgs) -> Result<(), CliError> {
    let (response, report) = parse_response(&read_payload(&args.payload)?)?;
    match output_mode(cli) {
        OutputMode::Human => {
            println!("lines:        {}", report.lines);
            println!("inert lines:  {}", report.inert_lines);
            println!("inert atoms:  {}", report.inert_atoms);
            println!("truncated:    {}", report.depth_truncated);
            println!("highlighted:  {}", response.highlighted.len());
            println!("bucketed:     {}", response.bucketed.len());
            println!("chip values:  {:?}", response.chip_values);
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "decode",
                "report": serde_json::to_value(report)?,
                "clean": report.is_clean(),
                "response": serde_json::to_value(&response)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── helpers ────────────────────

fn parse_assignment(raw: &str) -> Result<(i64, i64), String> {
    let (index, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=VALUE, got {raw:?}"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|e| format!("invalid index {index:?}: {e}"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value {value:?}: {e}"))?;
    Ok((index, value))
}

fn read_payload(path: &Path) -> Result<String, CliError> {
    if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    fs::read_to_string(path).map_err(|e| CliError::User(format!("cannot read {}: {e}", path.display())))
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SOL_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

/// `--json` wins, then `SOL_OUTPUT_FORMAT`; the default is human output.
fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
