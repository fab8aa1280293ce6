use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};
use uuid::Uuid;

use turps_db::{Database, is_unique_violation, models::UserRow};
use turps_types::api::{LoginForm, RegisterForm};
use turps_types::models::User;

use crate::error::{AppError, blocking};
use crate::oauth::GoogleOAuth;
use crate::session::SessionManager;
use crate::views;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: SessionManager,
    /// `None` when Google credentials are not configured.
    pub google: Option<GoogleOAuth>,
}

// -- Service --

/// Creates a local account. The username's uniqueness is enforced by the
/// insert itself, so concurrent registrations of one name produce exactly one
/// account and one `DuplicateUser`.
pub async fn register_user(state: &AppState, username: &str, password: &str) -> Result<User, AppError> {
    if username.trim().is_empty() {
        return Err(AppError::InvalidInput("username must not be empty"));
    }
    if password.trim().is_empty() {
        return Err(AppError::InvalidInput("password must not be empty"));
    }

    let db = state.db.clone();
    let username = username.to_string();
    let password = password.to_string();
    let row = blocking(move || {
        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?
            .to_string();

        match db.create_user(&Uuid::new_v4().to_string(), &username, &password_hash) {
            Ok(row) => Ok(Some(row)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e),
        }
    })
    .await?;

    let user = user_from_row(row.ok_or(AppError::DuplicateUser)?)?;
    info!("Registered user {}", user.display_name());
    Ok(user)
}

/// Checks a username/password pair. Unknown users, OAuth-only accounts and
/// wrong passwords are indistinguishable to the caller.
pub async fn verify_credentials(state: &AppState, username: &str, password: &str) -> Result<User, AppError> {
    let db = state.db.clone();
    let username = username.to_string();
    let password = password.to_string();
    let row = blocking(move || {
        let Some(row) = db.get_user_by_username(&username)? else {
            return Ok(None);
        };
        let Some(stored) = row.password.as_deref() else {
            return Ok(None);
        };

        let parsed_hash =
            PasswordHash::new(stored).map_err(|e| anyhow!("Corrupt password hash for {}: {}", row.id, e))?;
        let valid = Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();

        Ok(valid.then_some(row))
    })
    .await?;

    user_from_row(row.ok_or(AppError::InvalidCredentials)?)
}

/// Finds the account linked to an OAuth provider id, creating it on first
/// sign-in. Calling it again with the same id returns the same user.
pub async fn login_with_external_identity(state: &AppState, external_id: &str) -> Result<User, AppError> {
    if external_id.is_empty() {
        return Err(AppError::OAuth("provider returned an empty user id".into()));
    }

    let db = state.db.clone();
    let external_id = external_id.to_string();
    let (row, created) =
        blocking(move || db.find_or_create_external_user(&Uuid::new_v4().to_string(), &external_id)).await?;

    let user = user_from_row(row)?;
    if created {
        info!("Created account {} from Google sign-in", user.display_name());
    }
    Ok(user)
}

pub(crate) fn user_from_row(row: UserRow) -> Result<User, AppError> {
    let id = row
        .id
        .parse::<Uuid>()
        .map_err(|e| anyhow!("Corrupt user id '{}': {}", row.id, e))?;

    Ok(User {
        id,
        username: row.username,
        external_id: row.external_id,
        created_at: views::parse_timestamp(&row.created_at),
    })
}

// -- Handlers --

pub async fn home(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    if state.sessions.resolve(&state.db, &jar).await?.is_some() {
        return Ok(Redirect::to("/chat").into_response());
    }
    Ok(views::home(state.google.is_some()).into_response())
}

pub async fn register_page() -> impl IntoResponse {
    views::register()
}

pub async fn login_page(State(state): State<AppState>) -> impl IntoResponse {
    views::login(state.google.is_some())
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    let user = register_user(&state, &form.username, &form.password).await?;
    let jar = state.sessions.start(&state.db, jar, &user).await?;
    Ok((jar, Redirect::to("/chat")))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let user = verify_credentials(&state, &form.username, &form.password)
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::InvalidCredentials) {
                warn!("Failed login for '{}'", form.username);
            }
        })?;

    let jar = state.sessions.start(&state.db, jar, &user).await?;
    Ok((jar, Redirect::to("/chat")))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse, AppError> {
    let jar = state.sessions.end(&state.db, jar).await?;
    Ok((jar, Redirect::to("/")))
}
