mod daemon;
mod report;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use keepsync_config::{AppConfig, DEFAULT_CONFIG_PATH};
use keepsync_engine::{ItemStatus, MutationEvent, OneOrMany, ServiceData, TodoService};
use keepsync_runtime::{Collaborators, DaemonClient};

#[derive(Debug, Parser)]
#[command(
    name = "keepsync",
    version,
    about = "Keeps an ICA shopping list and a Keep todo list in sync"
)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Daemon socket; defaults to `daemon.socket_path` from the config.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the sync daemon in the foreground.
    Run,
    /// Run a full bidirectional pass now.
    Refresh,
    /// Add one item straight to an ICA list.
    Add {
        text: String,
        /// Target list; defaults to the configured one.
        #[arg(long)]
        list_id: Option<String>,
    },
    /// Show engine state.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Forward a Keep todo mutation to the daemon.
    ///
    /// Either pass the fields as flags or the raw `call_service` event data
    /// with `--json`.
    Event {
        #[arg(long, value_enum, required_unless_present = "json")]
        service: Option<CliService>,
        #[arg(long, required_unless_present = "json")]
        entity: Option<String>,
        /// Item text; repeat for multi-item calls.
        #[arg(long = "item")]
        items: Vec<String>,
        #[arg(long, value_enum)]
        status: Option<CliStatus>,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long, conflicts_with_all = ["service", "entity", "items", "status", "rename"])]
        json: Option<String>,
    },
    /// Validate the configuration without contacting anything.
    Check,
    Ping,
    /// Ask a running daemon to shut down.
    Stop,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliService {
    AddItem,
    RemoveItem,
    UpdateItem,
}

impl From<CliService> for TodoService {
    fn from(service: CliService) -> Self {
        match service {
            CliService::AddItem => TodoService::AddItem,
            CliService::RemoveItem => TodoService::RemoveItem,
            CliService::UpdateItem => TodoService::UpdateItem,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStatus {
    NeedsAction,
    Completed,
}

impl From<CliStatus> for ItemStatus {
    fn from(status: CliStatus) -> Self {
        match status {
            CliStatus::NeedsAction => ItemStatus::NeedsAction,
            CliStatus::Completed => ItemStatus::Completed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    let daemon_mode = matches!(cli.command, Commands::Run);
    let _log_guard = daemon::init_logging(&config.telemetry, daemon_mode)?;

    let socket_path = cli
        .socket
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.daemon.socket_path));
    let client = DaemonClient::new(&socket_path);

    match cli.command {
        Commands::Run => {
            daemon::run_foreground(config, &cli.config, &socket_path).await?;
        }
        Commands::Refresh => {
            let summary = client.refresh().await?;
            report::print_summary(&summary);
        }
        Commands::Add { text, list_id } => {
            println!("{}", client.add_item(list_id, &text).await?);
        }
        Commands::Status { json } => {
            let status = client.get_status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                report::print_status(&status);
            }
        }
        Commands::Event {
            service,
            entity,
            items,
            status,
            rename,
            json,
        } => {
            let event = match json {
                Some(raw) => serde_json::from_str::<MutationEvent>(&raw)?,
                None => build_event(service, entity, items, status, rename)?,
            };
            tracing::debug!(service = ?event.service, "forwarding todo event");
            println!("{}", client.send_event(event).await?);
        }
        Commands::Check => {
            config.validate()?;
            Collaborators::from_config(&config)?;
            report::print_config(&config, &cli.config);
        }
        Commands::Ping => {
            println!("{}", client.ping().await?);
        }
        Commands::Stop => {
            daemon::daemon_stop(&client).await?;
        }
    }

    Ok(())
}

fn build_event(
    service: Option<CliService>,
    entity: Option<String>,
    items: Vec<String>,
    status: Option<CliStatus>,
    rename: Option<String>,
) -> Result<MutationEvent> {
    let (Some(service), Some(entity)) = (service, entity) else {
        bail!("--service and --entity are required without --json");
    };
    let item = match items.len() {
        0 => None,
        1 => items.into_iter().next().map(OneOrMany::One),
        _ => Some(OneOrMany::Many(items)),
    };
    Ok(MutationEvent {
        service: service.into(),
        service_data: ServiceData {
            entity_id: Some(OneOrMany::One(entity)),
            item,
            status: status.map(Into::into),
            rename,
        },
    })
}
