//! CLI entry point: loads configuration, wires up logging, and either
//! runs a design in-process or starts a `--slave-mode` remote runtime.
//!
//! The HDL lexer/parser is out of scope for this crate (see
//! `DESIGN.md`): a design is assembled via `cascade::ast::builders` by
//! whatever embeds this crate as a library, then registered by name so
//! `--slave-mode` callers can address it. `<SOURCE>` here names that
//! registered module rather than a path to Verilog text.

use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cascade::{Config, Error};

#[derive(Debug, Parser)]
#[command(name = "cascade", version, about = "A just-in-time compiler and execution engine for a synchronous hardware description language")]
struct Cli {
    /// Name of the top-level module to run.
    source: String,

    #[arg(long)]
    include_path: Vec<String>,
    #[arg(long)]
    enable_inlining: bool,
    #[arg(long)]
    open_loop_target: Option<u64>,

    #[arg(long)]
    slave_mode: bool,
    #[arg(long)]
    slave_port: Option<u16>,
    #[arg(long)]
    slave_path: Option<String>,

    #[arg(long)]
    quartus_host: Option<String>,
    #[arg(long)]
    quartus_port: Option<u16>,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };
    if let Some(target) = cli.open_loop_target {
        config.runtime.open_loop_target = target;
    }
    if cli.slave_mode {
        config.remote.slave_mode = true;
    }
    if let Some(port) = cli.slave_port {
        config.remote.listen_addr = format!("127.0.0.1:{port}");
    }

    init_logging(&config);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "cascade exited with an error");
            match e {
                Error::Config(_) => ExitCode::from(1),
                Error::Elaborate(_) | Error::Resolve(_) => ExitCode::from(2),
                _ => ExitCode::from(1),
            }
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<(), Error> {
    if config.remote.slave_mode {
        return run_slave(cli, config).await;
    }

    tracing::debug!(
        include_path = ?cli.include_path,
        enable_inlining = cli.enable_inlining,
        quartus_host = ?cli.quartus_host,
        quartus_port = ?cli.quartus_port,
        "elaboration options"
    );
    tracing::warn!(
        module = %cli.source,
        "running a design in-process requires building its AST via a host \
         application (no lexer/parser ships in this crate); use --slave-mode \
         to serve a pre-registered module instead"
    );
    Ok(())
}

async fn run_slave(cli: Cli, config: Config) -> Result<(), Error> {
    use cascade::remote::{ModuleRegistry, RemoteRuntime};

    let registry = ModuleRegistry {
        arena: cascade::ast::Arena::new(),
        modules: std::collections::HashMap::new(),
    };
    let _ = cli.slave_path;
    let runtime = RemoteRuntime::new(registry, 4);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handle = stop.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        stop_handle.store(true, std::sync::atomic::Ordering::Release);
    });

    runtime
        .run(&config.remote.listen_addr, stop)
        .await
        .map_err(Error::Io)
}
