//! gracestop - run a command with coordinated graceful shutdown
//!
//! Usage:
//!     gracestop [--config <path>] [-- <command> [args...]]
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use gracestop::config::{Config, load_config};
use gracestop::hooks::hook_task;
use gracestop::shutdown::Coordinator;
use gracestop::supervisor::ChildProcess;
use gracestop::util::init_logging;

/// Run a command and shut it down gracefully, running cleanup hooks on exit.
#[derive(Parser, Debug)]
#[command(name = "gracestop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Command to supervise; without one, gracestop waits for a signal
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => load_config(path).with_context(|| {
            format!("failed to load configuration from '{}'", path.display())
        })?,
        None => Config::default(),
    };

    // Determine log level (CLI overrides config)
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.global.log_level);

    init_logging(log_level, &config.global.log_format);

    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Auto exit: {}", config.shutdown.auto_exit);
        println!("  Exit code: {}", config.shutdown.exit_code);
        println!(
            "  Max shutdown time: {}",
            humantime::format_duration(config.shutdown.max_shutdown_time)
        );
        println!(
            "  Child grace period: {}",
            humantime::format_duration(config.supervisor.grace_period)
        );
        println!("  Hooks: {}", config.hooks.len());
        for hook in &config.hooks {
            println!("    - {} ({} {})", hook.name, hook.command, hook.args.join(" "));
        }
        return Ok(());
    }

    info!(
        config_path = ?cli.config,
        hooks = config.hooks.len(),
        max_shutdown_time = %humantime::format_duration(config.shutdown.max_shutdown_time),
        "gracestop starting"
    );

    run(config, cli.command)
}

/// Build the runtime and run until shutdown.
fn run(config: Config, command: Vec<String>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config, command).await })
}

/// Async entry point.
async fn run_async(config: Config, command: Vec<String>) -> Result<()> {
    let coordinator =
        Coordinator::new(config.shutdown).context("invalid shutdown options")?;

    for hook in config.hooks {
        info!(name = %hook.name, command = %hook.command, "configured hook");
        coordinator.register(&hook_task(hook));
    }

    // Registered before install so any trigger stops the child
    let child = match command.split_first() {
        Some((program, args)) => {
            let child = ChildProcess::spawn(program, args, config.supervisor.grace_period)
                .with_context(|| format!("failed to start '{}'", program))?;
            let stop = child.stop_task();
            coordinator.register(&stop);
            Some((child, stop))
        }
        None => None,
    };

    let _installation = coordinator
        .install()
        .context("failed to install shutdown listeners")?;

    match child {
        Some((mut child, stop)) => {
            match child.wait().await {
                Ok(status) => info!(%status, "child process exited"),
                Err(e) => warn!(error = %e, "lost track of child process"),
            }
            coordinator.unregister(&stop);
            // Ignored when a signal or fault already started the pass
            coordinator.drain().await;
        }
        None => info!("press Ctrl+C to stop"),
    }

    let outcome = coordinator.finished().await;
    info!(?outcome, "gracestop shut down complete");
    Ok(())
}
