pub mod code;
pub mod config;
pub mod device;
pub mod index;
pub mod message;
pub mod reply;
pub mod res;
pub mod rooms;
pub mod session;
pub mod store;
pub mod sweeper;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}};

use crate::{store::SharedStore, sweeper::ExpiryPolicy};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: SharedStore,
    pub expiry: ExpiryPolicy,
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}\n\n{}", self.0, self.0.backtrace()),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
