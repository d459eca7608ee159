//! CLI for fanout
//!
//! Subcommands:
//! - `server` (default): run the WebSocket server
//! - `subscribe`: print every event published to a topic
//! - `publish`: publish a single event and print the acknowledgement

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fanout::broker::Broker;
use fanout::config::{LoggingSettings, Settings, load_config};
use fanout::transport::{ClientMessage, Drain, ServerMessage, start_websocket_server};
use fanout::utils::{ServerError, logging};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fanout", about = "In-process publish/subscribe over WebSockets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Subscribe to a topic and print incoming events
    Subscribe {
        #[arg(long, default_value = "ws://127.0.0.1:4000/graphql")]
        url: String,
        #[arg(long)]
        topic: Option<String>,
    },
    /// Publish one event to a topic
    Publish {
        #[arg(long, default_value = "ws://127.0.0.1:4000/graphql")]
        url: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        content: String,
        #[arg(long)]
        sender: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(&LoggingSettings::default());
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.logging);

    let result = match cli.command.unwrap_or(Command::Server) {
        Command::Server => run_server(settings).await,
        Command::Subscribe { url, topic } => run_subscribe(&url, topic).await,
        Command::Publish {
            url,
            topic,
            content,
            sender,
        } => run_publish(&url, topic, content, sender).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    let broker = Broker::with_settings(settings.broker.clone());
    let drain = Drain::new(broker.clone());
    let server = tokio::spawn(start_websocket_server(
        listener,
        broker,
        drain.clone(),
        settings.server.clone(),
    ));

    info!("Server running on port: {}", settings.server.port);

    tokio::signal::ctrl_c().await.map_err(ServerError::Io)?;
    info!("Shutdown signal received. Draining.");

    let outcome = drain
        .drain_and_dispose(settings.shutdown.drain_grace())
        .await;
    info!(?outcome, "Shutdown complete");

    let _ = server.await;
    Ok(())
}

async fn run_subscribe(url: &str, topic: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (mut ws_stream, _) = connect_async(url).await?;

    let subscribe = ClientMessage::Subscribe {
        id: "1".to_string(),
        topic,
    };
    ws_stream
        .send(WsMessage::text(serde_json::to_string(&subscribe)?))
        .await?;

    while let Some(frame) = ws_stream.next().await {
        let frame = frame?;
        if !frame.is_text() {
            continue;
        }
        match serde_json::from_str::<ServerMessage>(frame.to_text()?)? {
            ServerMessage::Next { payload, .. } => {
                println!("{}: {}", payload.sender, payload.content);
            }
            ServerMessage::Error { message, .. } => {
                return Err(format!("Subscription failed: {message}").into());
            }
            ServerMessage::Complete { .. } => break,
            _ => {}
        }
    }

    Ok(())
}

async fn run_publish(
    url: &str,
    topic: Option<String>,
    content: String,
    sender: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut ws_stream, _) = connect_async(url).await?;

    let publish = ClientMessage::Publish {
        id: Some("publish".to_string()),
        topic,
        content,
        sender,
    };
    ws_stream
        .send(WsMessage::text(serde_json::to_string(&publish)?))
        .await?;

    while let Some(frame) = ws_stream.next().await {
        let frame = frame?;
        if !frame.is_text() {
            continue;
        }
        match serde_json::from_str::<ServerMessage>(frame.to_text()?)? {
            ServerMessage::Ack { message, .. } => {
                println!("{message}");
                break;
            }
            ServerMessage::Error { message, .. } => {
                ws_stream.close(None).await?;
                return Err(format!("Publish failed: {message}").into());
            }
            _ => {}
        }
    }

    ws_stream.close(None).await?;
    Ok(())
}
