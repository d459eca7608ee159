//! WebSocket transport
//!
//! Responsibilities:
//! - Accept TCP connections and upgrade them on the configured path
//! - Create a `Client` per connection with its own writer task
//! - Translate protocol messages into broker calls, spawning a
//!   `DeliveryAdapter` per subscription
//! - Tear the connection down on disconnect (aborting adapters) or on drain
//!   (letting adapters finish what is queued, then closing the socket)

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Broker, Event};
use crate::client::Client;
use crate::config::ServerSettings;
use crate::transport::adapter::DeliveryAdapter;
use crate::transport::drain::{ConnectionGuard, Drain};
use crate::transport::message::{ClientMessage, ServerMessage};

/// Serves connections from `listener` until `drain` begins.
pub async fn start_websocket_server(
    listener: TcpListener,
    broker: Broker,
    drain: Drain,
    settings: ServerSettings,
) {
    match listener.local_addr() {
        Ok(addr) => info!("WebSocket server listening on ws://{addr}{}", settings.path),
        Err(e) => warn!(error = %e, "WebSocket server listening on unknown address"),
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let guard = drain.track();
                    spawn(handle_connection(
                        stream,
                        peer,
                        broker.clone(),
                        drain.clone(),
                        settings.clone(),
                        guard,
                    ));
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            },
            _ = drain.signalled() => {
                info!("No longer accepting connections");
                break;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Broker,
    drain: Drain,
    settings: ServerSettings,
    _guard: ConnectionGuard,
) {
    let path = settings.path;
    let check_path = move |request: &Request, response: Response| {
        if path.is_empty() || request.uri().path() == path {
            return Ok(response);
        }
        let mut rejection = ErrorResponse::new(Some(format!(
            "no endpoint at {}",
            request.uri().path()
        )));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };

    let ws_stream = match accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(settings.outbound_buffer.max(1));
    let mut client = Client::new(tx);
    let client_id = client.id.clone();
    info!(client = %client_id, %peer, "client connected");

    // Forward frames from adapters and replies to the socket. Ends once every
    // sender is gone, then closes the socket.
    let writer = {
        let client_id = client_id.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!(client = %client_id, error = %e, "Failed to send message");
                    return;
                }
            }
            let _ = ws_sender.close().await;
        })
    };

    let mut draining = false;
    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(msg)) if msg.is_text() => match msg.to_text() {
                    Ok(text) => handle_message(&mut client, &broker, text).await,
                    Err(e) => debug!(client = %client_id, error = %e, "Unreadable text frame"),
                },
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(client = %client_id, error = %e, "WebSocket error");
                    break;
                }
                None => break,
            },
            Some(operation) = client.reap() => {
                debug!(client = %client_id, %operation, "operation finished");
            }
            _ = drain.signalled() => {
                draining = true;
                break;
            }
        }
    }

    if draining {
        debug!(client = %client_id, "draining connection");
        client.finish_adapters().await;
    } else {
        client.abort_adapters().await;
    }

    drop(client);
    let _ = writer.await;

    info!(client = %client_id, draining, "client disconnected");
}

/// Applies one client frame to the broker, replying through `client`.
pub(crate) async fn handle_message(client: &mut Client, broker: &Broker, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { id, topic }) => {
            if client.has_operation(&id) {
                client
                    .send(&ServerMessage::error(
                        Some(id.clone()),
                        format!("subscriber for {id} already exists"),
                    ))
                    .await;
                return;
            }

            let topic = topic.unwrap_or_else(|| broker.settings().default_topic.clone());
            match broker.subscribe(&topic) {
                Ok(subscription) => {
                    debug!(client = %client.id, operation = %id, %topic, "subscribed");
                    let adapter = DeliveryAdapter::new(id, subscription, client.sender());
                    client.start(adapter);
                }
                Err(e) => {
                    client
                        .send(&ServerMessage::error(Some(id), e.to_string()))
                        .await;
                }
            }
        }

        Ok(ClientMessage::Complete { id }) => {
            if client.cancel(&id) {
                debug!(client = %client.id, operation = %id, "unsubscribed");
            }
        }

        Ok(ClientMessage::Publish {
            id,
            topic,
            content,
            sender,
        }) => {
            let topic = topic.unwrap_or_else(|| broker.settings().default_topic.clone());
            let reply = match broker.publish(&topic, Event::new(content, sender)) {
                Ok(ack) => {
                    debug!(client = %client.id, %topic, delivered = ack.delivered, "published");
                    ServerMessage::Ack {
                        id,
                        message: ack.message,
                        delivered: ack.delivered,
                    }
                }
                Err(e) => ServerMessage::error(id, e.to_string()),
            };
            client.send(&reply).await;
        }

        Ok(ClientMessage::Health) => {
            client
                .send(&ServerMessage::Health {
                    status: "OK".to_string(),
                })
                .await;
        }

        Ok(ClientMessage::Ping) => {
            client.send(&ServerMessage::Pong).await;
        }

        Err(err) => {
            warn!(
                client = %client.id,
                error = %err,
                "Invalid client message: {}",
                text.chars().take(100).collect::<String>()
            );
            client
                .send(&ServerMessage::error(None, format!("invalid message: {err}")))
                .await;
        }
    }
}
