//! Server-rendered pages. Deliberately plain: markup only, styling comes from
//! `/static/styles.css`.

use axum::response::Html;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use turps_types::models::Message;

/// Parses a stored timestamp. SQLite's `datetime('now')` has no timezone, so
/// fall back to reading it as naive UTC.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

/// Escapes text for HTML element and attribute content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<title>{title} · Turps</title>
<link rel=\"stylesheet\" href=\"/static/styles.css\">
</head>
<body>
{body}
</body>
</html>
",
        title = escape(title),
    ))
}

fn google_button(enabled: bool) -> &'static str {
    if enabled {
        "<p><a class=\"button google\" href=\"/auth/google\">Sign in with Google</a></p>"
    } else {
        ""
    }
}

pub fn home(google_enabled: bool) -> Html<String> {
    page(
        "Welcome",
        &format!(
            "<main class=\"home\">
<h1>Turps</h1>
<p>A shared message board.</p>
<p><a class=\"button\" href=\"/register\">Register</a> <a class=\"button\" href=\"/login\">Log in</a></p>
{}
</main>",
            google_button(google_enabled)
        ),
    )
}

pub fn register() -> Html<String> {
    page(
        "Register",
        "<main>
<h1>Register</h1>
<form action=\"/register\" method=\"post\">
<label>Username <input type=\"text\" name=\"username\" required autocomplete=\"username\"></label>
<label>Password <input type=\"password\" name=\"password\" required autocomplete=\"new-password\"></label>
<button type=\"submit\">Register</button>
</form>
</main>",
    )
}

pub fn login(google_enabled: bool) -> Html<String> {
    page(
        "Log in",
        &format!(
            "<main>
<h1>Log in</h1>
<form action=\"/login\" method=\"post\">
<label>Username <input type=\"text\" name=\"username\" required autocomplete=\"username\"></label>
<label>Password <input type=\"password\" name=\"password\" required autocomplete=\"current-password\"></label>
<button type=\"submit\">Log in</button>
</form>
{}
</main>",
            google_button(google_enabled)
        ),
    )
}

pub fn chat(username: &str, messages: &[Message]) -> Html<String> {
    let mut items = String::new();
    for m in messages {
        items.push_str(&format!(
            "<li><span class=\"author\">{}</span> <span class=\"body\">{}</span></li>\n",
            escape(&m.author_name),
            escape(&m.body)
        ));
    }

    page(
        "Chat",
        &format!(
            "<main class=\"chat\">
<header><span>Signed in as <strong>{user}</strong></span> <a href=\"/logout\">Log out</a></header>
<ul class=\"messages\">
{items}</ul>
<form action=\"/chat\" method=\"post\">
<input type=\"text\" name=\"message\" required autofocus>
<button type=\"submit\">Send</button>
</form>
<form action=\"/clear\" method=\"post\">
<input type=\"hidden\" name=\"confirm\" value=\"yes\">
<button type=\"submit\" class=\"danger\">Clear messages</button>
</form>
</main>",
            user = escape(username),
        ),
    )
}

/// Short message page with a single onward link.
pub fn notice(title: &str, text: &str, link: &str) -> Html<String> {
    page(
        title,
        &format!(
            "<main>
<h1>{}</h1>
<p>{}</p>
<p><a href=\"{}\">Continue</a></p>
</main>",
            escape(title),
            escape(text),
            escape(link)
        ),
    )
}
