use serde::{Deserialize, Serialize};

use crate::models::User;

// -- Forms --

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Chat form. Any author field the page sends along is ignored; the author is
/// always the signed-in user.
#[derive(Debug, Deserialize)]
pub struct PostMessageForm {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearForm {
    pub confirm: Option<String>,
}

impl ClearForm {
    pub fn confirmed(&self) -> bool {
        self.confirm.as_deref() == Some("yes")
    }
}

// -- OAuth --

/// Query parameters Google appends to the callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// -- Request context --

/// Identity resolved from the session cookie, attached to each authenticated
/// request as an extension.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    /// Keyed hash of the cookie token, as stored in the sessions table.
    pub session_id: String,
    pub user: User,
}
