pub mod auth;
pub mod config;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod oauth;
pub mod router;
pub mod session;
pub mod views;
