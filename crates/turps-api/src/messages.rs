use axum::{
    Extension, Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::warn;

use turps_types::api::{AuthContext, ClearForm, PostMessageForm};
use turps_types::models::Message;

use crate::auth::AppState;
use crate::error::{AppError, blocking};
use crate::session::SESSION_COOKIE;
use crate::views;

// -- Message board --

/// Every stored message, oldest first. No paging.
pub async fn list_messages(state: &AppState) -> Result<Vec<Message>, AppError> {
    let db = state.db.clone();
    let rows = blocking(move || db.get_messages()).await?;

    Ok(rows
        .into_iter()
        .map(|row| Message {
            id: row.id,
            author_name: row.author_name,
            body: row.body,
            created_at: views::parse_timestamp(&row.created_at),
        })
        .collect())
}

pub async fn post_message(state: &AppState, author_name: &str, body: &str) -> Result<(), AppError> {
    if body.trim().is_empty() {
        return Err(AppError::InvalidInput("message must not be empty"));
    }

    let db = state.db.clone();
    let author = author_name.to_string();
    let body = body.to_string();
    blocking(move || db.insert_message(&author, &body)).await?;
    Ok(())
}

/// Deletes every message. Accounts are untouched.
pub async fn clear_messages(state: &AppState) -> Result<usize, AppError> {
    let db = state.db.clone();
    blocking(move || db.delete_all_messages()).await
}

/// Deletes every account; their sessions go with them.
pub async fn clear_users(state: &AppState) -> Result<usize, AppError> {
    let db = state.db.clone();
    blocking(move || db.delete_all_users()).await
}

// -- Handlers --

pub async fn chat_page(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let messages = list_messages(&state).await?;
    Ok(views::chat(&ctx.user.display_name(), &messages))
}

/// The author is always the signed-in user, whatever the form says.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Form(form): Form<PostMessageForm>,
) -> Result<impl IntoResponse, AppError> {
    post_message(&state, &ctx.user.display_name(), &form.message).await?;
    Ok(Redirect::to("/chat"))
}

pub async fn clear_all_messages(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Form(form): Form<ClearForm>,
) -> Result<impl IntoResponse, AppError> {
    if !form.confirmed() {
        return Err(AppError::ConfirmationRequired);
    }

    let count = clear_messages(&state).await?;
    warn!("{} cleared the board ({} messages)", ctx.user.display_name(), count);
    Ok(Redirect::to("/chat"))
}

pub async fn clear_all_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
    Form(form): Form<ClearForm>,
) -> Result<impl IntoResponse, AppError> {
    if !form.confirmed() {
        return Err(AppError::ConfirmationRequired);
    }

    let count = clear_users(&state).await?;
    warn!("{} deleted all accounts ({} users)", ctx.user.display_name(), count);

    // The caller's own session went with their account.
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/")))
}
