// src/main.rs
mod app;
mod cert;
mod config;
mod discovery;
mod ui;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{run_update, RunOptions};
use config::store::{default_kubeconfig_path, expand_path};
use discovery::{FetchTimeouts, SshExecutor};
use ui::{SummaryView, TerminalPrompt};
use utils::logging::{FileLogger, Logger, MultiLogger, TracingLogger};

/// Refresh kubeconfig client credentials from each cluster's
/// control-plane admin.conf.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Kubeconfig to update (default: ~/.kube/config)
    #[arg(short, long)]
    pub kubeconfig: Option<String>,

    /// SSH private key used to reach the control-plane hosts
    #[arg(short, long)]
    pub identity: Option<String>,

    /// Extra `ssh -o` option, may be repeated
    #[arg(short = 'o', long = "ssh-option")]
    pub ssh_options: Vec<String>,

    /// Seconds to wait for the plain read of admin.conf
    #[arg(long, default_value_t = 5)]
    pub read_timeout: u64,

    /// Seconds to wait for the sudo read of admin.conf
    #[arg(long, default_value_t = 30)]
    pub sudo_timeout: u64,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Also append log lines to this file
    #[arg(long)]
    pub log_file: Option<String>,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn build_logger(args: &Args) -> MultiLogger {
    let mut logger = MultiLogger::new().with(Box::new(TracingLogger));
    if let Some(raw) = &args.log_file {
        match FileLogger::new(&expand_path(raw), args.debug) {
            Ok(file) => logger = logger.with(Box::new(file)),
            Err(e) => tracing::warn!("Cannot open log file {}: {}", raw, e),
        }
    }
    logger
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);
    let mut logger = build_logger(&args);

    logger.info("Kubernetes Config Updater");

    let kubeconfig: PathBuf = match &args.kubeconfig {
        Some(raw) => expand_path(raw),
        None => match default_kubeconfig_path() {
            Ok(path) => path,
            Err(e) => {
                logger.error(&e.to_string());
                return ExitCode::FAILURE;
            }
        },
    };

    let options = RunOptions {
        kubeconfig,
        timeouts: FetchTimeouts {
            read: Duration::from_secs(args.read_timeout),
            sudo: Duration::from_secs(args.sudo_timeout),
        },
    };
    let executor = SshExecutor::new(
        args.identity.as_deref().map(expand_path),
        args.ssh_options.clone(),
    );
    let mut prompt = TerminalPrompt;

    match run_update(&options, &executor, &mut prompt, &mut logger).await {
        Ok(summary) => {
            print!("{}", SummaryView(&summary));
            ExitCode::SUCCESS
        }
        Err(e) => {
            logger.error(&format!(
                "Aborting, {} was not modified: {}",
                options.kubeconfig.display(),
                e
            ));
            ExitCode::FAILURE
        }
    }
}
