//! Google sign-in: authorization code flow with PKCE.
//!
//! [`GoogleOAuth::authorize_url`] stores the CSRF state and PKCE verifier in
//! the `oauth_states` table for ten minutes and returns the URL to send the
//! browser to. The callback hands the state back to
//! [`GoogleOAuth::exchange_code`], which consumes the stored row (so each state
//! works once), trades the code for an access token and reads the account's
//! stable Google id from the userinfo endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{debug, warn};

use turps_db::Database;
use turps_types::api::OAuthCallbackQuery;

use crate::auth::{AppState, login_with_external_identity};
use crate::config::GoogleConfig;
use crate::error::{AppError, blocking};
use crate::session::timestamp;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// How long a started sign-in stays valid.
const STATE_TTL_MINUTES: i64 = 10;

/// Google user info from API. Only the stable id is kept.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

pub struct GoogleOAuth {
    client: ConfiguredClient,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: &GoogleConfig) -> anyhow::Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?)
            .set_redirect_uri(RedirectUrl::new(config.callback_url.clone())?);

        // Token and userinfo calls never follow redirects.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, http })
    }

    /// Starts a sign-in and returns the Google URL to redirect to.
    pub async fn authorize_url(&self, db: &Arc<Database>) -> Result<String, AppError> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        let db = db.clone();
        let state = csrf_state.secret().clone();
        let verifier = pkce_verifier.secret().clone();
        let expires_at = timestamp(Utc::now() + chrono::Duration::minutes(STATE_TTL_MINUTES));
        blocking(move || db.insert_oauth_state(&state, &verifier, &expires_at)).await?;

        Ok(auth_url.to_string())
    }

    /// Completes a sign-in and returns the Google account id.
    pub async fn exchange_code(
        &self,
        db: &Arc<Database>,
        code: &str,
        state: &str,
    ) -> Result<String, AppError> {
        let pkce_verifier = consume_state(db, state).await?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| AppError::OAuth(format!("token exchange failed: {}", e)))?;

        let google_user: GoogleUser = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::OAuth(format!("userinfo request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("userinfo response unreadable: {}", e)))?;

        Ok(google_user.id)
    }
}

/// Takes the stored PKCE verifier for `state`. Unknown, reused and expired
/// states all fail.
async fn consume_state(db: &Arc<Database>, state: &str) -> Result<String, AppError> {
    let db = db.clone();
    let state = state.to_string();
    blocking(move || db.take_oauth_state(&state, &timestamp(Utc::now())))
        .await?
        .ok_or_else(|| AppError::OAuth("invalid or expired OAuth state".into()))
}

// -- Handlers --

/// GET /auth/google
pub async fn google_start(State(state): State<AppState>) -> Result<Response, AppError> {
    let Some(google) = &state.google else {
        warn!("Google sign-in requested but GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET are not set");
        return Ok(Redirect::to("/login").into_response());
    };

    let url = google.authorize_url(&state.db).await?;
    debug!("Redirecting to Google for sign-in");
    Ok(Redirect::to(&url).into_response())
}

/// GET /auth/google/chat — the OAuth redirect target.
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<impl IntoResponse, AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::OAuth("Google sign-in is not configured".into()))?;

    if let Some(error) = query.error {
        return Err(AppError::OAuth(format!("provider returned error: {}", error)));
    }
    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        return Err(AppError::OAuth("callback is missing code or state".into()));
    };

    let external_id = google.exchange_code(&state.db, &code, &csrf_state).await?;
    let user = login_with_external_identity(&state, &external_id).await?;

    let jar = state.sessions.start(&state.db, jar, &user).await?;
    Ok((jar, Redirect::to("/chat")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> GoogleOAuth {
        GoogleOAuth::new(&GoogleConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            callback_url: "http://localhost:3000/auth/google/chat".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn authorize_url_carries_state_and_pkce() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let url = google().authorize_url(&db).await.unwrap();

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("scope=profile"));
        assert!(url.contains("code_challenge_method=S256"));

        let parsed = reqwest::Url::parse(&url).unwrap();
        let state = parsed
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        // The stored state can be consumed exactly once.
        assert!(consume_state(&db, &state).await.is_ok());
        assert!(matches!(consume_state(&db, &state).await, Err(AppError::OAuth(_))));
    }

    #[tokio::test]
    async fn unknown_state_is_rejected_before_any_network_call() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let res = google().exchange_code(&db, "code", "never-issued").await;
        assert!(matches!(res, Err(AppError::OAuth(_))));
    }
}
