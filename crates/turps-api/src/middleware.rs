use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::AppState;
use crate::error::AppError;

/// Resolve the session cookie into an `AuthContext` request extension.
/// Anonymous requests are sent back to the home page.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = state
        .sessions
        .resolve(&state.db, &jar)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
