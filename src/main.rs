use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;

use livetrack::config::{Config, LoggingConfig};
use livetrack::sync::remote;
use livetrack::{logging, server, IngestRequest};

#[derive(Parser)]
#[command(name = "livetrack")]
#[command(
    about = "Live device location broadcast server with WebSocket fan-out",
    version
)]
#[command(after_help = "Endpoints:
- POST /update_location   {\"device_id\": ..., \"lat\": ..., \"lng\": ...}
- GET  /ws                WebSocket stream of new_location events
- GET  /locations         Last known location of every device
- GET  /health            Device and subscriber counts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (default)
    Serve(ServeArgs),

    /// Connect as a viewer and print every location event
    Watch {
        /// WebSocket endpoint, e.g. ws://localhost:5000/ws
        #[arg(long, value_name = "URL", default_value = "ws://127.0.0.1:5000/ws")]
        url: String,
    },

    /// Send a single location update
    Push {
        /// Server base URL
        #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:5000")]
        url: String,

        #[arg(short, long)]
        device: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Events buffered per viewer before updates are dropped for it
    #[arg(long)]
    subscriber_capacity: Option<usize>,

    /// Maximum concurrent viewers (0 = unlimited)
    #[arg(long)]
    max_subscribers: Option<usize>,

    /// Also write daily rolling logs to this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl ServeArgs {
    fn into_config(self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(capacity) = self.subscriber_capacity {
            config.hub = config.hub.subscriber_capacity(capacity);
        }
        if let Some(max) = self.max_subscribers {
            config.hub = config.hub.max_subscribers(max);
        }
        if let Some(dir) = self.log_dir {
            config.logging.directory = Some(dir);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Serve(ServeArgs::default()));

    match command {
        Commands::Serve(args) => {
            let config = args.into_config()?;
            let _log_guard = logging::init(&config.logging)?;

            println!(
                "{}",
                format!(
                    "🌐 Starting LiveTrack {} on {}...",
                    livetrack::VERSION,
                    config.server.bind_addr()
                )
                .cyan()
                .bold()
            );
            println!(
                "  {} {}",
                "ingest:".bright_black(),
                format!("http://{}/update_location", config.server.bind_addr()).bright_blue()
            );
            println!(
                "  {} {}",
                "stream:".bright_black(),
                format!("ws://{}/ws", config.server.bind_addr()).bright_blue()
            );

            server::start(&config).await?;
        }

        Commands::Watch { url } => {
            let _log_guard = logging::init(&LoggingConfig::default())?;

            let (mut events, reader) = remote::connect_viewer(&url).await?;
            println!("{} Connected to {}", "✓".green(), url.bright_blue());

            while let Some(event) = events.recv().await {
                println!(
                    "{} {} {}",
                    "📍".bright_yellow(),
                    event.device_id.bright_white().bold(),
                    format!("({:.6}, {:.6})", event.location.lat, event.location.lng).bright_black()
                );
            }

            reader.abort();
            println!("{} Stream closed", "✗".red());
        }

        Commands::Push {
            url,
            device,
            lat,
            lng,
        } => {
            let request = IngestRequest::new(device, lat, lng);
            let ack = remote::push_update(&url, &request).await?;
            println!(
                "{} {} -> {}",
                "✓".green(),
                request.device_id.bright_white(),
                ack.status.green()
            );
        }
    }

    Ok(())
}
