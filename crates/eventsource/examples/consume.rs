//! Event Stream Example
//!
//! Serves a short ticker stream with axum and consumes it with an
//! [`EventSource`], which reconnects once the first stream ends and resumes
//! from the last delivered ID.
//!
//! Run with: `RUST_LOG=eventsource=debug cargo run -p eventsource --example consume`

use std::time::Duration;

use axum::{Router, routing::get};
use eventsource::{EventSource, EventSourceConfig, Message, server};
use futures_util::{StreamExt, pin_mut};
use http::HeaderMap;
use tracing_subscriber::EnvFilter;

const TICKS_PER_CONNECTION: u64 = 3;
const TOTAL_TICKS: u64 = 6;

async fn ticker(headers: HeaderMap) -> axum::response::Response {
    // Resume after the last ID the client saw.
    let start = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(0, |id| id + 1);

    server::respond(&headers, move |mut encoder, disconnected| async move {
        if start >= TOTAL_TICKS {
            return;
        }
        let end = (start + TICKS_PER_CONNECTION).min(TOTAL_TICKS);
        for tick in start..end {
            let message = Message::new(format!("tick {tick}"))
                .with_id(tick.to_string())
                .with_event("tick");
            if encoder.write(&message).await.is_err() {
                return;
            }
            tokio::select! {
                () = disconnected.cancelled() => return,
                () = tokio::time::sleep(Duration::from_millis(200)) => {}
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/events", get(ticker));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let config = EventSourceConfig::new(format!("http://{addr}/events"))
        .retry(Duration::from_millis(500));
    let source = EventSource::new(config)?;
    let handle = source.close_handle();

    let messages = source.into_stream();
    pin_mut!(messages);

    let mut received = 0;
    while let Some(item) = messages.next().await {
        match item {
            Ok(message) => {
                println!(
                    "[{}] {} (id {})",
                    message.event_str().unwrap_or_default(),
                    message.data_str().unwrap_or_default(),
                    message.id_str().unwrap_or_default(),
                );
                received += 1;
                if received == TOTAL_TICKS {
                    handle.close();
                }
            }
            Err(err) if err.is_closed() => {
                println!("stream finished: {err}");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
