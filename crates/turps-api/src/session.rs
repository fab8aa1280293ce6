use std::sync::Arc;
use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tracing::{debug, info, warn};

use turps_db::Database;
use turps_types::api::AuthContext;
use turps_types::models::User;

use crate::auth::user_from_row;
use crate::error::{AppError, blocking};

pub const SESSION_COOKIE: &str = "turps_session";

type HmacSha256 = Hmac<Sha256>;

/// Server-side sessions keyed by an HMAC of the cookie token. The raw token
/// only ever lives in the browser.
pub struct SessionManager {
    mac: HmacSha256,
    ttl: chrono::Duration,
    secure: bool,
}

impl SessionManager {
    pub fn new(secret: &str, ttl_hours: i64, secure: bool) -> anyhow::Result<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;
        let ttl = chrono::Duration::try_hours(ttl_hours)
            .ok_or_else(|| anyhow::anyhow!("Session lifetime out of range: {} hours", ttl_hours))?;
        Ok(Self { mac, ttl, secure })
    }

    /// Storage key for a cookie token.
    pub fn session_id(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Creates a session for `user` and returns the jar with the new cookie.
    pub async fn start(
        &self,
        db: &Arc<Database>,
        jar: CookieJar,
        user: &User,
    ) -> Result<CookieJar, AppError> {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = B64.encode(bytes);

        let id = self.session_id(&token);
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .map(timestamp)
            .ok_or_else(|| anyhow::anyhow!("Session expiry overflows: ttl {}", self.ttl))?;
        let user_id = user.id.to_string();

        let db = db.clone();
        blocking(move || db.insert_session(&id, &user_id, &expires_at)).await?;

        info!("Session started for {}", user.display_name());
        Ok(jar.add(self.cookie(token)))
    }

    /// Resolves the session cookie, if any, into the signed-in identity.
    /// Expired sessions are deleted on sight.
    pub async fn resolve(
        &self,
        db: &Arc<Database>,
        jar: &CookieJar,
    ) -> Result<Option<AuthContext>, AppError> {
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Ok(None);
        };
        let id = self.session_id(&token);

        let db = db.clone();
        let lookup = id.clone();
        let row = blocking(move || {
            let row = db.get_session(&lookup)?;
            match row {
                Some(r) if r.expires_at <= timestamp(Utc::now()) => {
                    db.delete_session(&r.id)?;
                    Ok(None)
                }
                other => Ok(other),
            }
        })
        .await?;

        let Some(row) = row else {
            debug!("Session cookie did not match a live session");
            return Ok(None);
        };

        Ok(Some(AuthContext {
            session_id: row.id,
            user: user_from_row(row.user)?,
        }))
    }

    /// Deletes the session named by the cookie, if any, and clears the cookie.
    pub async fn end(&self, db: &Arc<Database>, jar: CookieJar) -> Result<CookieJar, AppError> {
        if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
            let id = self.session_id(&token);
            let db = db.clone();
            if blocking(move || db.delete_session(&id)).await? {
                info!("Session ended");
            }
        }
        Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
    }

    fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }
}

/// RFC 3339 in UTC with a fixed width, so stored timestamps compare as text.
pub(crate) fn timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Periodically removes expired sessions and abandoned OAuth states.
pub async fn run_sweep_loop(db: Arc<Database>, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        match sweep_expired(&db).await {
            Ok((sessions, states)) => {
                if sessions + states > 0 {
                    info!("Sweep: pruned {} sessions, {} OAuth states", sessions, states);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}

pub async fn sweep_expired(db: &Arc<Database>) -> Result<(usize, usize), AppError> {
    let db = db.clone();
    blocking(move || {
        let now = timestamp(Utc::now());
        Ok((db.delete_expired_sessions(&now)?, db.delete_expired_oauth_states(&now)?))
    })
    .await
}
