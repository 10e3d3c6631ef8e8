use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use pantrychat_core::{
    config::Config, model::ChatStreamRequest, server, server::AppState, stream::OutboundEvent,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about = "Pantry chat streaming relay", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML). Environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP relay server
    Serve {
        #[arg(long, help = "Override the listen port")]
        port: Option<u16>,
    },
    /// Stream one reply to stdout (prints deltas live)
    Chat {
        #[arg(long)]
        model: Option<String>,
        #[arg(short, long, help = "Message from the user")]
        message: String,
        #[arg(long = "item", help = "Pantry item to include as context (repeatable)")]
        items: Vec<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let cfg = match path {
        Some(p) => Config::from_path(p)?.with_env_overrides(|k| std::env::var(k).ok())?,
        None => Config::from_env()?,
    };
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                cfg.server.port = port;
            }
            info!("Starting server...");
            server::serve(&cfg, shutdown_signal()).await?;
            info!("Server shut down");
        }
        Commands::Chat {
            model,
            message,
            items,
        } => {
            if let Some(model) = model {
                cfg.upstream.model = model;
            }
            let state = AppState::from_config(&cfg)?;
            let session = state.open_session(ChatStreamRequest {
                prompt: message,
                context: Some(items),
            })?;

            let mut events = session.into_events();
            let mut saw_text = false;
            while let Some(ev) = events.next().await {
                match ev {
                    OutboundEvent::Text(txt) => {
                        saw_text = true;
                        print!("{}", txt);
                        io::stdout().flush().ok();
                    }
                    OutboundEvent::Done => {
                        if saw_text {
                            println!();
                        }
                        eprintln!("[done]");
                    }
                    OutboundEvent::Error(msg) => {
                        if saw_text {
                            println!();
                        }
                        eprintln!("[error: {}]", msg);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
