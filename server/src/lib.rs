//! Ticket-sales backend: seat inventory with race-free purchases and
//! single-session authentication.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

use std::sync::Arc;

use chrono::Duration;

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::notify::{NotificationDispatcher, NotificationPublisher};
use crate::services::SessionAuthority;
use crate::state::AppState;
use crate::store::Store;

/// Wires the services for a backend from configuration.
pub fn build_state<S: Store>(
    config: &Config,
    store: S,
    publisher: Arc<dyn NotificationPublisher>,
) -> AppState<S> {
    let tokens = TokenIssuer::new(
        config.secret_key.as_bytes(),
        Duration::minutes(config.access_token_ttl_minutes),
        Duration::days(config.refresh_token_ttl_days),
    );
    let sessions = SessionAuthority::new(store.clone(), tokens);

    AppState::new(store, sessions, NotificationDispatcher::new(publisher))
}
