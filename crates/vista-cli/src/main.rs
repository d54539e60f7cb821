use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vista", about = "VISTA perception gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Config file path (defaults to ~/.vista/config.json5)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Print the effective configuration
    Config {
        /// Config file path (defaults to ~/.vista/config.json5)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn load(config_path: Option<String>) -> anyhow::Result<vista_config::VistaConfig> {
    match config_path {
        Some(path) => Ok(vista_config::load_config_from(std::path::Path::new(&path))?),
        None => Ok(vista_config::load_config()?),
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => {
            let config = load(config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(vista_server::start_server(config, port))?;
        }
        Commands::Config { config } => {
            let config = load(config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
