use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::models::{Event, NewEvent};
use crate::state::AppState;
use crate::store::Store;
use crate::utils::response::{created, empty_success, success};
use crate::utils::{AppError, AppJson, AppPath};

#[derive(Serialize)]
struct EventCreated {
    event: Event,
    total_tickets: u32,
}

fn event_not_found(event_id: Uuid) -> AppError {
    AppError::NotFound(format!("Event '{}' not found", event_id))
}

pub async fn create_event<S: Store>(
    State(state): State<AppState<S>>,
    AdminUser(admin): AdminUser,
    AppJson(body): AppJson<NewEvent>,
) -> Result<Response, AppError> {
    body.validate().map_err(AppError::ValidationError)?;

    let event = state.store.create_event(&body).await?;
    info!(event_id = %event.id, seats = body.total_tickets, admin = %admin.id, "Event created");

    Ok(created(
        EventCreated {
            event,
            total_tickets: body.total_tickets,
        },
        "Event and tickets created successfully",
    ))
}

pub async fn get_event<S: Store>(
    State(state): State<AppState<S>>,
    AppPath(event_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    let event = state
        .store
        .get_event(event_id)
        .await?
        .ok_or_else(|| event_not_found(event_id))?;

    Ok(success(event, "Event retrieved"))
}

pub async fn list_event_tickets<S: Store>(
    State(state): State<AppState<S>>,
    AppPath(event_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    if state.store.get_event(event_id).await?.is_none() {
        return Err(event_not_found(event_id));
    }

    let tickets = state.store.list_tickets(event_id).await?;
    Ok(success(tickets, "Tickets retrieved"))
}

pub async fn delete_event<S: Store>(
    State(state): State<AppState<S>>,
    AdminUser(admin): AdminUser,
    AppPath(event_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    if !state.store.delete_event(event_id).await? {
        return Err(event_not_found(event_id));
    }

    info!(%event_id, admin = %admin.id, "Event deleted with its tickets");
    Ok(empty_success("Event deleted"))
}
