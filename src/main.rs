use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use coinpulse::core::log::init_logging;
use coinpulse::core::series::Timeframe;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl TryFrom<Commands> for coinpulse::AppCommand {
    type Error = anyhow::Error;

    fn try_from(cmd: Commands) -> Result<coinpulse::AppCommand> {
        Ok(match cmd {
            Commands::Market => coinpulse::AppCommand::Market,
            Commands::Portfolio { sort, desc } => coinpulse::AppCommand::Portfolio {
                sort: sort.as_deref().map(str::parse).transpose()?,
                descending: desc,
            },
            Commands::Chart { symbol, timeframe } => coinpulse::AppCommand::Chart {
                symbol,
                timeframe: timeframe.parse::<Timeframe>()?,
            },
            Commands::Watch { symbol, timeframe } => coinpulse::AppCommand::Watch {
                symbol,
                timeframe: timeframe.parse::<Timeframe>()?,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display market overview and top coins
    Market,
    /// Display the basket valuation and performance
    Portfolio {
        /// Sort holdings by name, price, weight, 1h, 24h, 7d, 30d or 1y
        #[arg(short, long)]
        sort: Option<String>,
        /// Sort in descending order
        #[arg(short, long)]
        desc: bool,
    },
    /// Display the price history of a coin
    Chart {
        /// Coin symbol, defaults to the first coin in the list
        symbol: Option<String>,
        /// One of 24h, 7d or 30d
        #[arg(short, long, default_value = "24h")]
        timeframe: String,
    },
    /// Keep refreshing market and portfolio data until interrupted
    Watch {
        /// Coin to chart, defaults to the first coin in the list
        #[arg(short, long)]
        symbol: Option<String>,
        /// One of 24h, 7d or 30d
        #[arg(short, long, default_value = "24h")]
        timeframe: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => match coinpulse::AppCommand::try_from(cmd) {
            Ok(command) => coinpulse::run_command(command, cli.config_path.as_deref()).await,
            Err(e) => Err(e),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> Result<()> {
    use anyhow::Context;

    let path = coinpulse::core::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = coinpulse::core::config::AppConfig::default_yaml()?;
    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    println!("Created default configuration at {}", path.display());
    Ok(())
}
