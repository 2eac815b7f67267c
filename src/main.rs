//! Wave host entry point.
//!
//! Loads configuration, starts the core, loads modules and runs either a
//! single command or the interactive session.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use wave_core::config::AppConfig;
use wave_core::error::AppError;
use wave_module::CoreAccess;
use wave_runtime::output::format_result;
use wave_runtime::{Core, run_session};

/// Wave: a host for natively loaded modules.
#[derive(Debug, Parser)]
#[command(name = "wave", version, about)]
struct Cli {
    /// Configuration file (TOML). Defaults to `config/default.toml`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay loaded from `config/<env>.toml`.
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Additional module binary to load (repeatable).
    #[arg(short, long = "module", value_name = "PATH")]
    modules: Vec<PathBuf>,

    /// Do not start the interactive session.
    #[arg(long)]
    no_interactive: bool,

    /// Command executed once instead of the interactive session.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref(), &cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    match run(cli, config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("Wave error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // stdout belongs to the interactive session.
    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(io::stderr)
                .init();
        }
    }
}

/// Runs the host and returns the process exit code.
async fn run(cli: Cli, config: AppConfig) -> Result<i32, AppError> {
    tracing::info!("Starting Wave v{}", env!("CARGO_PKG_VERSION"));

    let core = Core::native(&config.modules);
    core.initialize(config.host.settings_file.as_deref().map(Path::new))?;

    if let Some(file) = &config.logging.file {
        core.logging().enable_file_logging(file)?;
    }

    load_modules(&core, &config, &cli.modules);

    let code = if !cli.command.is_empty() {
        let result = core.execute(&cli.command.join(" "));
        println!("{}", format_result(&result));
        if result.is_ok() { 0 } else { 1 }
    } else if cli.no_interactive {
        0
    } else {
        let session_core = core.clone();
        let session = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            run_session(
                &session_core.commands(),
                stdin.lock(),
                BufWriter::new(io::stdout()),
            )
        });

        tokio::select! {
            joined = session => {
                match joined {
                    Ok(Ok(count)) => tracing::info!(commands = count, "Interactive session ended"),
                    Ok(Err(e)) => tracing::error!("Session I/O error: {}", e),
                    Err(e) => tracing::error!("Session task failed: {}", e),
                }
            }
            _ = shutdown_signal() => {
                tracing::info!("Shutdown signal received, starting graceful shutdown...");
                core.shutdown();
                // The session thread is still blocked on stdin.
                return Ok(130);
            }
        }
        0
    };

    core.shutdown();
    tracing::info!("Wave shut down gracefully");
    Ok(code)
}

/// Loads the configured module directory, then the paths given on the
/// command line. Failures are reported and skipped.
fn load_modules(core: &Arc<Core>, config: &AppConfig, extra: &[PathBuf]) {
    let registry = core.registry();
    let directory = Path::new(&config.modules.directory);

    if config.modules.auto_load && directory.is_dir() {
        match registry.load_directory(directory) {
            Ok(results) => {
                for (path, result) in results {
                    if let Err(e) = result {
                        tracing::warn!(path = %path.display(), "Skipping module: {}", e);
                    }
                }
            }
            Err(e) => tracing::warn!("Module auto-load failed: {}", e),
        }
    }

    for path in extra {
        if let Err(e) = registry.load(path) {
            tracing::error!(path = %path.display(), "Failed to load module: {}", e);
        }
    }

    tracing::info!(loaded = registry.count(), "Modules ready");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
