/// kube-debug - debug pods for Kubernetes
///
/// Launches short-lived debug pods, optionally privileged on a given node with the
/// host filesystem mounted, and attaches an interactive shell to them.
mod config;
mod debug;
mod error;
mod k8s;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DebugConfig;
use crate::k8s::{DebugPod, SessionContext, SessionOptions};

#[derive(Parser)]
#[command(name = "kube-debug")]
#[command(about = "Launch debug pods on Kubernetes and attach a shell", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubeconfig file path (defaults to KUBECONFIG, then ~/.kube/config)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true)]
    context: Option<String>,

    /// YAML file with session defaults (image, container, shell, polling)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Commands related to Kubernetes
    Kube {
        #[command(subcommand)]
        command: KubeCommands,
    },
}

#[derive(Subcommand)]
enum KubeCommands {
    /// Run a debug pod and open a shell in it
    #[command(alias = "debugPod")]
    DebugPod(DebugPodArgs),

    /// Run a privileged debug pod on a node with the host filesystem mounted
    #[command(alias = "debugHost")]
    DebugHost(DebugHostArgs),
}

#[derive(Args, Debug)]
struct DebugPodArgs {
    /// Debug pod name
    #[arg(short = 'p', long, default_value = "debug-pod")]
    name: String,

    /// Namespace on which the debug pod will be created
    #[arg(short, long, default_value = "default")]
    namespace: String,

    /// Seconds to wait for the pod to become Running
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct DebugHostArgs {
    /// Kubernetes node name to debug
    #[arg(short = 'j', long)]
    hostname: String,

    #[command(flatten)]
    pod: DebugPodArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; stdout belongs to the remote shell
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("kube_debug={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Execute command
    let result = match &cli.command {
        Commands::Kube { command } => match command {
            KubeCommands::DebugPod(args) => debug_pod(&cli, args).await,
            KubeCommands::DebugHost(args) => debug_host(&cli, args).await,
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Plain debug pod in a namespace
async fn debug_pod(cli: &Cli, args: &DebugPodArgs) -> Result<()> {
    let config = load_config(cli, args.timeout)?;
    let pod = DebugPod::plain(&args.name, &args.namespace).with_config(&config);

    run(cli, &pod, &config).await
}

/// Host-mode debug pod pinned to a node
async fn debug_host(cli: &Cli, args: &DebugHostArgs) -> Result<()> {
    if args.hostname.trim().is_empty() {
        anyhow::bail!("--hostname cannot be empty");
    }

    let config = load_config(cli, args.pod.timeout)?;
    let pod = DebugPod::host(&args.hostname, &args.pod.name, &args.pod.namespace)
        .with_config(&config);

    run(cli, &pod, &config).await
}

async fn run(cli: &Cli, pod: &DebugPod, config: &DebugConfig) -> Result<()> {
    let options = SessionOptions {
        kubeconfig: cli.kubeconfig.clone(),
        context: cli.context.clone(),
    };
    let session = SessionContext::resolve(&options).await?;

    debug::run_session(&session, pod, config).await?;

    info!("Debug session for pod {} finished", pod.name);
    info!("The pod is left running; delete it with:");
    info!("  kubectl delete pod {} -n {}", pod.name, pod.namespace);

    Ok(())
}

/// Load the defaults file, with `--timeout` taking precedence
fn load_config(cli: &Cli, timeout: Option<u64>) -> Result<DebugConfig> {
    let mut config = match &cli.config {
        Some(path) => DebugConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => DebugConfig::default(),
    };

    if let Some(timeout) = timeout {
        config.wait_timeout_secs = timeout;
        config.validate().context("Invalid --timeout")?;
    }

    Ok(config)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<error::Error>()
        .map(error::Error::exit_code)
        .unwrap_or(1)
}
