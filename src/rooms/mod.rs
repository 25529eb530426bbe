mod client;
mod events;
mod msg;
mod snapshot;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use client::{ChatClient, Transcript};
pub use events::{Command, ViewEvent};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::room_ws))
        .route("/{code}/messages", get(snapshot::room_messages))
}
