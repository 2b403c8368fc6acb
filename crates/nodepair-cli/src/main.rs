//! nodepair CLI - p2p device enrollment.
//!
//! This is the entry point for the `nodepair` binary. The same binary runs on
//! both sides: `install` on the node, `register` on the operator's machine.

mod console;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nodepair_control::{
    read_config, CommandCaptureReader, EnrollConfig, EnrollmentSession, ScriptInstaller, Sender,
    SetupOutcome, SystemdServiceManager,
};
use nodepair_ledger::{HttpLedger, RendezvousChannel};
use tracing_subscriber::EnvFilter;

use console::{ConsoleStderr, KeyWatcher};
use ui::TerminalUi;

/// nodepair - registers and installs nodes over a p2p network.
#[derive(Parser, Debug)]
#[command(name = "nodepair")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ledger API address.
    #[arg(long, global = true, env = "NODEPAIR_API", default_value = "127.0.0.1:8080")]
    api: String,

    /// Namespace of the ledger buckets.
    #[arg(long, global = true, env = "NODEPAIR_NAMESPACE")]
    namespace: Option<String>,

    /// YAML file with enrollment settings.
    #[arg(long, global = true, env = "NODEPAIR_SETTINGS")]
    settings: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a configuration to a node waiting for enrollment.
    Register {
        /// Cloud-config file to send.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Device to install onto.
        #[arg(long, default_value = "")]
        device: String,

        /// Reboot the node right after installation.
        #[arg(long)]
        reboot: bool,

        /// Token shown by the node, or a photo of its screen. Scans the
        /// screen when omitted.
        token: Option<String>,
    },

    /// Start enrollment on this node and install once configured.
    #[command(alias = "i")]
    Install,

    /// Configure the p2p network from the node's cloud-configs.
    #[command(alias = "s")]
    Setup {
        /// Directory holding the cloud-configs.
        #[arg(default_value = "/oem")]
        dir: PathBuf,
    },

    /// Print the cluster kubeconfig, pointed at the control plane.
    GetKubeconfig,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("nodepair=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(|| ConsoleStderr)
        .init();
}

/// Load settings from `path` (if any) and apply command-line overrides.
fn load_config(path: Option<&Path>, namespace: Option<String>) -> anyhow::Result<EnrollConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read settings {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("invalid settings {}", path.display()))?
        }
        None => EnrollConfig::default(),
    };

    if let Some(namespace) = namespace {
        config.namespace = namespace;
    }
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.settings.as_deref(), args.namespace)?;
    let ledger = Arc::new(HttpLedger::new(&args.api)?);

    match args.command {
        Command::Register {
            config: config_file,
            device,
            reboot,
            token,
        } => {
            let channel = RendezvousChannel::new(ledger, &config.namespace);
            let reader = Arc::new(CommandCaptureReader::new(config.capture_command.clone()));
            let sender = Sender::new(channel, reader).with_token_ttl(config.token_ttl());

            let payload = read_config(config_file.as_deref());
            println!("Sending registration payload, please wait");
            sender
                .send(token.as_deref(), &device, &payload, reboot)
                .await?;
            println!("Payload sent, installation will start on the machine briefly");
        }

        Command::Install => {
            let mut session = EnrollmentSession::new(
                ledger,
                Arc::new(ScriptInstaller::new(config.install_command.clone())),
                Arc::new(SystemdServiceManager::new()),
                Arc::new(KeyWatcher),
                Arc::new(TerminalUi::from_env()),
                config,
            );
            session.run().await?;
        }

        Command::Setup { dir } => {
            match nodepair_control::setup(&dir, &config, &SystemdServiceManager::new()).await? {
                SetupOutcome::Configured { source } => {
                    println!("Network token configured from {}", source.display());
                }
                SetupOutcome::NothingToDo => {
                    tracing::debug!(dir = %dir.display(), "Nothing to set up");
                }
            }
        }

        Command::GetKubeconfig => {
            let kubeconfig =
                nodepair_control::kubeconfig::fetch(ledger.as_ref(), &config.namespace).await?;
            println!("{kubeconfig}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    init_tracing(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
