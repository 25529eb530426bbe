use axum::{
    debug_handler,
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    http::{header::USER_AGENT, HeaderMap},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{device::Device, store::SharedStore, sweeper::ExpiryPolicy};

use super::{client::ChatClient, events::{Command, ViewEvent}};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    State(store): State<SharedStore>,
    State(expiry): State<ExpiryPolicy>,
    headers: HeaderMap,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let device = headers
        .get(USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(Device::from_user_agent)
        .unwrap_or(Device::Pointer);

    ws.on_upgrade(move |stream| run_connection(stream, store, expiry, device))
}

async fn run_connection(stream: WebSocket, store: SharedStore, expiry: ExpiryPolicy, device: Device) {
    let (mut sender, mut receiver) = stream.split();
    let (view_tx, mut view_rx) = mpsc::unbounded_channel::<ViewEvent>();

    let mut view_task = tokio::spawn(async move {
        while let Some(event) = view_rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut client = ChatClient::new(store, expiry, device, view_tx);
    debug!("Page connected ({:?})", device);

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                match serde_json::from_str::<Command>(text.as_str()) {
                    Ok(command) => client.handle(command).await,
                    Err(e) => debug!("Ignoring malformed command: {}", e),
                }
            }
            event = client.next_child_event() => client.on_child_event(event),
            _ = &mut view_task => break,
        }
    }

    if let Some(session) = client.session() {
        info!("{} left {}", session.author(), session.room());
    }
    view_task.abort();
}
