use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::views;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("username already taken")]
    DuplicateUser,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("not signed in")]
    Unauthenticated,

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("confirmation required")]
    ConfirmationRequired,

    #[error("oauth: {0}")]
    OAuth(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::DuplicateUser => (
                StatusCode::CONFLICT,
                views::notice(
                    "This user already exists",
                    "Please log in if you own this account.",
                    "/login",
                ),
            )
                .into_response(),
            AppError::InvalidCredentials => Redirect::to("/login").into_response(),
            AppError::Unauthenticated => Redirect::to("/").into_response(),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::ConfirmationRequired => (
                StatusCode::BAD_REQUEST,
                "Confirmation required: resubmit with confirm=yes",
            )
                .into_response(),
            AppError::OAuth(msg) => {
                warn!("Google sign-in failed: {}", msg);
                Redirect::to("/login").into_response()
            }
            AppError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").into_response()
            }
        }
    }
}

/// Runs a blocking database call off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
        .map_err(AppError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn redirecting_errors() {
        let res = AppError::InvalidCredentials.into_response();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[LOCATION], "/login");

        let res = AppError::Unauthenticated.into_response();
        assert_eq!(res.headers()[LOCATION], "/");

        let res = AppError::OAuth("denied".into()).into_response();
        assert_eq!(res.headers()[LOCATION], "/login");
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::DuplicateUser.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::ConfirmationRequired.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("disk I/O error")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
