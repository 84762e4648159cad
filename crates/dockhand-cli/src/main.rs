//! dockhand - Docking Station dashboard CLI

use clap::{Parser, Subcommand};
use dockhand_cli::commands::{self, SettingsUpdate};
use dockhand_config::GlobalConfig;
use dockhand_core::StackManager;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(author, version, about = "Docker Compose dashboard CLI", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend base URL (overrides the configured one)
    #[arg(long, global = true, env = "DOCKHAND_BACKEND_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stacks and their services
    List {
        /// Only services with a pending update
        #[arg(long)]
        updates: bool,
        /// Only services whose update has matured
        #[arg(long)]
        matured: bool,
        /// Case-insensitive name filter
        #[arg(long)]
        search: Option<String>,
        /// Ask the backend for a fresh scan instead of its cached one
        #[arg(long)]
        no_cache: bool,
    },

    /// Show one stack in detail
    Show {
        /// Stack name
        stack: String,
    },

    /// Update services and watch the tasks to completion
    Update {
        /// Targets as 'stack' or 'stack/service' (interactive selection if omitted)
        targets: Vec<String>,
        /// Start the tasks and exit without watching
        #[arg(short, long)]
        detach: bool,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
        /// Look for a .env file next to each compose file
        #[arg(long)]
        infer_envfile: bool,
        /// Prune dangling images afterwards
        #[arg(long)]
        prune_images: bool,
        /// Pull only, do not recreate containers
        #[arg(long)]
        no_restart: bool,
    },

    /// Watch update tasks that are already running
    Watch {
        /// Services as 'stack/service'
        #[arg(required = true)]
        services: Vec<String>,
    },

    /// Run unattended update sweeps over matured updates
    Auto {
        /// Run a single sweep and exit instead of looping
        #[arg(long)]
        once: bool,
    },

    /// Manage website latency monitors
    Monitor {
        #[command(subcommand)]
        command: MonitorCommands,
    },

    /// Show or change backend settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },

    /// Show or edit the local configuration
    Config {
        /// Open config in editor
        #[arg(short, long)]
        edit: bool,
    },
}

#[derive(Subcommand)]
enum MonitorCommands {
    /// List registered monitors
    List,
    /// Register a website
    Add { name: String, url: String },
    /// Remove a monitor and its history
    Remove { id: i64 },
    /// Resume checks for a monitor
    Enable { id: i64 },
    /// Pause checks for a monitor
    Disable { id: i64 },
    /// Show stored latency samples
    History {
        id: i64,
        /// Samples per page
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Samples to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show the most recent sample
    Latest {
        id: i64,
        /// Average over the last samples instead of the raw value
        #[arg(long)]
        rolling: bool,
        /// Window size for the rolling average
        #[arg(long)]
        window: Option<u32>,
    },
    /// Delete all stored samples
    Clear { id: i64 },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the backend settings
    Show,
    /// Change backend settings
    Set {
        /// Enable or disable the backend's own update sweeps
        #[arg(long)]
        auto_update: Option<bool>,
        /// Sweep interval, e.g. 12h or 1d
        #[arg(long)]
        auto_update_interval: Option<String>,
        /// Stacks updated concurrently per sweep
        #[arg(long)]
        max_concurrent: Option<u32>,
        /// Log what would be updated without doing it
        #[arg(long)]
        dryrun: Option<bool>,
        /// How long the backend may serve cached scans, e.g. 1d
        #[arg(long)]
        cache_max_age: Option<String>,
        /// How old an update must be before sweeps pick it up, e.g. 1w
        #[arg(long)]
        mature_after: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = GlobalConfig::load().unwrap_or_default();
    if let Some(url) = cli.url {
        config.backend.url = url;
    }

    // Handle config separately (doesn't need a reachable backend)
    if let Commands::Config { edit } = &cli.command {
        return commands::config(*edit).await;
    }

    let backend = dockhand_api::connect(&config).await.map_err(|err| {
        anyhow::anyhow!(
            "Could not reach the backend at {}: {}",
            config.backend.url,
            err
        )
    })?;
    let manager = StackManager::new(Arc::new(backend), config);

    match cli.command {
        Commands::List {
            updates,
            matured,
            search,
            no_cache,
        } => {
            commands::list(&manager, updates, matured, search, no_cache).await?;
        }
        Commands::Show { stack } => {
            commands::show(&manager, &stack).await?;
        }
        Commands::Update {
            targets,
            detach,
            yes,
            infer_envfile,
            prune_images,
            no_restart,
        } => {
            let mut options = manager.update_options();
            if infer_envfile {
                options.infer_envfile = true;
            }
            if prune_images {
                options.prune_images = true;
            }
            if no_restart {
                options.restart_containers = false;
            }
            commands::update(&manager, targets, options, yes, detach).await?;
        }
        Commands::Watch { services } => {
            commands::watch(&manager, services).await?;
        }
        Commands::Auto { once } => {
            commands::auto_update(&manager, once).await?;
        }
        Commands::Monitor { command } => match command {
            MonitorCommands::List => commands::monitor_list(&manager).await?,
            MonitorCommands::Add { name, url } => {
                commands::monitor_add(&manager, name, url).await?
            }
            MonitorCommands::Remove { id } => commands::monitor_remove(&manager, id).await?,
            MonitorCommands::Enable { id } => {
                commands::monitor_set_active(&manager, id, true).await?
            }
            MonitorCommands::Disable { id } => {
                commands::monitor_set_active(&manager, id, false).await?
            }
            MonitorCommands::History { id, limit, offset } => {
                commands::monitor_history(&manager, id, limit, offset).await?
            }
            MonitorCommands::Latest {
                id,
                rolling,
                window,
            } => commands::monitor_latest(&manager, id, rolling, window).await?,
            MonitorCommands::Clear { id } => commands::monitor_clear(&manager, id).await?,
        },
        Commands::Settings { command } => match command {
            None | Some(SettingsCommands::Show) => commands::settings_show(&manager).await?,
            Some(SettingsCommands::Set {
                auto_update,
                auto_update_interval,
                max_concurrent,
                dryrun,
                cache_max_age,
                mature_after,
            }) => {
                let update = SettingsUpdate {
                    auto_update,
                    auto_update_interval,
                    max_concurrent,
                    dryrun,
                    cache_max_age,
                    mature_after,
                };
                commands::settings_set(&manager, update).await?;
            }
        },
        Commands::Config { .. } => unreachable!(), // Handled above
    }

    Ok(())
}
