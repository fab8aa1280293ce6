use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat account. Local accounts carry a username; accounts created through
/// Google sign-in carry only the provider's stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown next to the user's messages.
    pub fn display_name(&self) -> String {
        if let Some(username) = &self.username {
            return username.clone();
        }
        match &self.external_id {
            Some(ext) => format!("google-{}", ext.chars().take(8).collect::<String>()),
            None => format!("user-{}", &self.id.simple().to_string()[..8]),
        }
    }
}

/// A posted chat message. The author name is a detached string, not a
/// reference to a user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, external_id: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.map(str::to_string),
            external_id: external_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_prefers_username() {
        let u = user(Some("alice"), Some("1234567890"));
        assert_eq!(u.display_name(), "alice");
    }

    #[test]
    fn display_name_falls_back_to_external_id() {
        let u = user(None, Some("10987654321"));
        assert_eq!(u.display_name(), "google-10987654");

        let short = user(None, Some("42"));
        assert_eq!(short.display_name(), "google-42");
    }
}
