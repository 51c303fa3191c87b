//! # Trellis Shell Daemon
//!
//! Runs the shell against a JSON-line host on stdout.
//!
//! The binary is a script player: host calls go out on stdout, but nothing
//! is read back. Chords and UI events come only from `--script`, and no
//! handles are ever published, so focus-on-show has no effect here.
//! Without a script it renders the initial tree once and exits.

use clap::Parser;
use core_types::{Clock, ManualClock, SystemClock};
use services_ui_bridge::{HandleSlots, JsonLineTransport};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use tracing::{error, info};
use trellisd::{init_logging, KeyScript, Shell, ShellConfig, ShellError};

#[derive(Debug, Parser)]
#[command(name = "trellisd", version, about = "Plays a key script against the Trellis shell, writing host calls to stdout")]
struct Cli {
    /// Shell configuration (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Key script to play; time only advances through its `wait` steps
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Log filter, overrides the configured one
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!(error = %err, "trellisd failed");
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ShellError> {
    let config = match &cli.config {
        Some(path) => ShellConfig::load(path)?,
        None => ShellConfig::default(),
    };
    init_logging(cli.log.as_deref().unwrap_or(&config.log_filter))?;

    let script = match &cli.script {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| ShellError::Io {
                path: path.clone(),
                source,
            })?;
            Some(KeyScript::from_text(&text)?)
        }
        None => None,
    };

    let manual = ManualClock::new();
    let clock: Rc<dyn Clock> = match script {
        Some(_) => Rc::new(manual.clone()),
        None => Rc::new(SystemClock::new()),
    };
    let host = JsonLineTransport::new(std::io::stdout());
    let shell = Shell::new(&config, Box::new(host), HandleSlots::new(), clock);
    shell.tick();

    if let Some(script) = script {
        let report = shell.play(&script, &manual);
        info!(
            steps = report.steps,
            keys_consumed = report.keys_consumed,
            commands_run = report.commands_run,
            renders = report.renders,
            "script finished"
        );
    }

    let state = shell.panels().state().snapshot();
    info!(version = state.version, panel = %state.current_panel, "shell finished");
    Ok(())
}
