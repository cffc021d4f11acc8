use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::notify::SaleNotification;
use crate::state::AppState;
use crate::store::Store;
use crate::utils::response::success;
use crate::utils::{AppError, AppPath};

pub async fn get_ticket<S: Store>(
    State(state): State<AppState<S>>,
    AppPath(ticket_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state
        .store
        .get_ticket(ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' not found", ticket_id)))?;

    Ok(success(ticket, "Ticket retrieved"))
}

pub async fn buy_ticket<S: Store>(
    State(state): State<AppState<S>>,
    CurrentUser(buyer): CurrentUser,
    AppPath(ticket_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state.purchases.purchase(ticket_id, buyer.id).await?;

    // The sale is committed; the confirmation email is best effort
    state
        .notifications
        .dispatch(SaleNotification::confirmation(&buyer.email, &ticket));

    Ok(success(ticket, "Ticket purchased successfully"))
}
