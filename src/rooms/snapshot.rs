use axum::{debug_handler, extract::{Path, State}, Json};

use crate::{message::Entry, store::SharedStore, AppResult};

/// Point-in-time read of a room, oldest first.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_messages(
    Path(code): Path<String>,
    State(store): State<SharedStore>,
) -> AppResult<Json<Vec<Entry>>> {
    Ok(Json(store.get(&code).await?))
}
