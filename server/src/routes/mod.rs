use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer, security::is_production};
use crate::handlers::{admin, auth, events, health_check, tickets};
use crate::state::AppState;
use crate::store::Store;

fn auth_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/register", post(auth::register::<S>))
        .route("/token", post(auth::login::<S>))
        .route("/refresh", post(auth::refresh::<S>))
        .route("/logout", post(auth::logout::<S>))
}

fn ticket_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/:ticket_id", get(tickets::get_ticket::<S>))
        .route("/buy/:ticket_id", post(tickets::buy_ticket::<S>))
}

fn event_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", post(events::create_event::<S>))
        .route(
            "/:event_id",
            get(events::get_event::<S>).delete(events::delete_event::<S>),
        )
        .route("/:event_id/tickets", get(events::list_event_tickets::<S>))
}

fn admin_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/tickets/:ticket_id/release", post(admin::release_ticket::<S>))
        .route("/users", get(admin::list_users::<S>))
        .route("/users/:user_id", delete(admin::deactivate_user::<S>))
        .route("/users/:user_id/role", patch(admin::change_role::<S>))
}

pub fn create_routes<S: Store>(state: AppState<S>) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/users/me", get(auth::me))
        .nest("/auth", auth_routes::<S>())
        .nest("/tickets", ticket_routes::<S>())
        .nest("/events", event_routes::<S>())
        .nest("/admin", admin_routes::<S>())
        .with_state(state);

    apply_security_headers(router, is_production())
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
}
