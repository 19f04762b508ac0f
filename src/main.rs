use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use update_engine_dbus::config::{self, BusKind, Config};
use update_engine_dbus::daemon;
use update_engine_dbus::dbus::{
    ModuleList, UpdateEngineClient, ATTEMPT_UPDATE_FLAG_NON_INTERACTIVE,
};
use update_engine_dbus::engine::InMemoryUpdateService;

#[derive(Parser)]
#[command(name = "update-engine-dbus")]
#[command(author, version, about = "D-Bus adaptor for the update engine", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the session bus instead of the configured one
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the update engine interface with the in-memory backend
    Serve,

    /// Configure settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands sent to a running service.
#[derive(Subcommand)]
enum ClientCommand {
    /// Show the current update status
    Status,

    /// Show version, rollback and end-of-life information
    Info,

    /// Check for and apply an update
    Update {
        /// Version to request (empty for latest)
        #[arg(long, default_value = "")]
        app_version: String,

        /// Update server URL (empty for default)
        #[arg(long, default_value = "")]
        omaha_url: String,

        /// Mark the attempt as not user initiated
        #[arg(long)]
        non_interactive: bool,
    },

    /// Install modules
    Install {
        /// Module IDs to install, in order
        #[arg(required = true)]
        ids: Vec<String>,

        /// Update server URL (empty for default)
        #[arg(long, default_value = "")]
        omaha_url: String,
    },

    /// Roll back to the previous version
    Rollback {
        /// Wipe user data while rolling back
        #[arg(long)]
        powerwash: bool,
    },

    /// Check whether a rollback is possible
    CanRollback,

    /// Reset the update status
    ResetStatus,

    /// Reboot if an update has been applied
    Reboot,

    /// Show or set the release channel
    Channel {
        /// Switch to this channel (e.g. "beta-channel")
        #[arg(long)]
        set: Option<String>,

        /// Allow a powerwash when switching to a more stable channel
        #[arg(long, requires = "set")]
        powerwash: bool,

        /// Show the channel currently installed instead of the target
        #[arg(long, conflicts_with = "set")]
        current: bool,
    },

    /// Show or set the cohort hint
    CohortHint {
        #[arg(long)]
        set: Option<String>,
    },

    /// Show or set whether updates may be shared peer-to-peer
    P2p {
        #[arg(long)]
        set: Option<bool>,
    },

    /// Show or set whether updates may be downloaded over cellular
    Cellular {
        #[arg(long, conflicts_with = "target_version")]
        set: Option<bool>,

        /// Allow only this version over cellular
        #[arg(long, requires = "target_size")]
        target_version: Option<String>,

        /// Expected payload size in bytes of the allowed version
        #[arg(long, requires = "target_version")]
        target_size: Option<i64>,
    },

    /// Print every status update until interrupted
    Watch,
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("update_engine_dbus=debug,zbus=info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("update_engine_dbus={},zbus=warn", level)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load();
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.to_ascii_lowercase())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let mut config = loaded.unwrap_or_else(|e| {
        warn!("Ignoring config file: {}", e);
        Config::default()
    });
    if cli.session {
        config.bus.kind = BusKind::Session;
    }

    match cli.command {
        Commands::Serve => {
            info!("Starting update engine service...");
            daemon::run(&config, Arc::new(InMemoryUpdateService::new())).await?;
        }

        Commands::Config { show } => {
            if show {
                config::show()?;
            } else {
                println!("Nothing to do; use --show");
            }
        }

        Commands::Client(command) => run_client(&config, command).await?,
    }

    Ok(())
}

async fn run_client(config: &Config, command: ClientCommand) -> anyhow::Result<()> {
    let client =
        UpdateEngineClient::connect_to(config.bus.kind, &config.bus.service_name, &config.bus.object_path)
            .await?;
    if !client.is_service_running().await {
        anyhow::bail!("{} is not running", config.bus.service_name);
    }

    match command {
        ClientCommand::Status => {
            println!("{}", client.get_status_advanced().await?);
        }

        ClientCommand::Info => {
            println!("PREV_VERSION={}", client.get_prev_version().await?);
            println!("ROLLBACK_PARTITION={}", client.get_rollback_partition().await?);
            println!(
                "DURATION_SINCE_UPDATE_USEC={}",
                client.get_duration_since_update().await?
            );
            println!("LAST_ATTEMPT_ERROR={}", client.get_last_attempt_error().await?);
            println!("EOL_STATUS={}", client.get_eol_status().await?);
        }

        ClientCommand::Update {
            app_version,
            omaha_url,
            non_interactive,
        } => {
            let flags = if non_interactive {
                ATTEMPT_UPDATE_FLAG_NON_INTERACTIVE
            } else {
                0
            };
            client.attempt_update(&app_version, &omaha_url, flags).await?;
            println!("Update check initiated");
        }

        ClientCommand::Install { ids, omaha_url } => {
            client
                .attempt_install(&ModuleList::new(omaha_url, ids))
                .await?;
            println!("Install initiated");
        }

        ClientCommand::Rollback { powerwash } => {
            client.attempt_rollback(powerwash).await?;
            println!("Rollback initiated");
        }

        ClientCommand::CanRollback => {
            println!("{}", client.can_rollback().await?);
        }

        ClientCommand::ResetStatus => {
            client.reset_status().await?;
        }

        ClientCommand::Reboot => {
            client.reboot_if_needed().await?;
        }

        ClientCommand::Channel {
            set,
            powerwash,
            current,
        } => match set {
            Some(channel) => client.set_channel(&channel, powerwash).await?,
            None => println!("{}", client.get_channel(current).await?),
        },

        ClientCommand::CohortHint { set } => match set {
            Some(hint) => client.set_cohort_hint(&hint).await?,
            None => println!("{}", client.get_cohort_hint().await?),
        },

        ClientCommand::P2p { set } => match set {
            Some(enabled) => client.set_p2p_update_permission(enabled).await?,
            None => println!("{}", client.get_p2p_update_permission().await?),
        },

        ClientCommand::Cellular {
            set,
            target_version,
            target_size,
        } => match (set, target_version.zip(target_size)) {
            (Some(allowed), _) => client.set_update_over_cellular_permission(allowed).await?,
            (None, Some((version, size))) => {
                client.set_update_over_cellular_target(&version, size).await?
            }
            (None, None) => println!("{}", client.get_update_over_cellular_permission().await?),
        },

        ClientCommand::Watch => {
            println!("{}\n", client.get_status_advanced().await?);
            client
                .watch(|status| {
                    println!("{}\n", status);
                    true
                })
                .await?;
        }
    }

    Ok(())
}
