mod config_commands;
mod connect_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use calbridge_config::CalbridgeConfig;

#[derive(Parser)]
#[command(name = "calbridge", about = "calbridge: connect Google and Microsoft calendars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the discovered `calbridge.toml`.
    #[arg(long, global = true, env = "CALBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the token-storage gateway.
    Gateway {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Connect a calendar provider through the browser.
    Connect {
        /// Provider name ("google" or "microsoft").
        #[arg(long)]
        provider: String,
        /// Print the authorization URL instead of opening a browser.
        #[arg(long, default_value_t = false)]
        no_browser: bool,
    },
    /// Finish a connect flow from a redirect URL pasted by hand.
    Callback {
        /// Full redirect URL including the `#...` fragment.
        #[arg(long)]
        url: String,
    },
    /// Show which providers are configured.
    Providers,
    /// List connected calendars.
    Calendars,
    /// Remove a connected calendar.
    Disconnect {
        #[arg(long)]
        provider: String,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CalbridgeConfig> {
    match path {
        Some(path) => {
            let mut config = calbridge_config::load_config(path)?;
            calbridge_config::apply_process_env(&mut config);
            Ok(config)
        },
        None => Ok(calbridge_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "calbridge starting");

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Gateway { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            calbridge_gateway::start_gateway(&config).await
        },
        Commands::Connect {
            provider,
            no_browser,
        } => connect_commands::connect(&config, &provider, no_browser).await,
        Commands::Callback { url } => connect_commands::callback(&config, &url).await,
        Commands::Providers => {
            connect_commands::providers(&config);
            Ok(())
        },
        Commands::Calendars => connect_commands::calendars(&config).await,
        Commands::Disconnect { provider } => {
            connect_commands::disconnect(&config, &provider).await
        },
        Commands::Config { action } => {
            config_commands::handle_config(action, &config, cli.config.as_deref())
        },
    }
}
