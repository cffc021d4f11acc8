use axum::extract::State;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::models::{TicketStatus, UserRole};
use crate::state::AppState;
use crate::store::Store;
use crate::utils::response::success;
use crate::utils::{AppError, AppJson, AppPath, AppQuery};

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: UserRole,
}

#[derive(Serialize)]
struct ReleasedTicket {
    ticket_id: Uuid,
    seat: String,
    status: TicketStatus,
    released_by: String,
}

fn user_not_found(user_id: Uuid) -> AppError {
    AppError::NotFound(format!("User '{}' not found", user_id))
}

pub async fn release_ticket<S: Store>(
    State(state): State<AppState<S>>,
    AdminUser(admin): AdminUser,
    AppPath(ticket_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state.purchases.release(ticket_id).await?;

    Ok(success(
        ReleasedTicket {
            ticket_id: ticket.id,
            seat: ticket.seat_number,
            status: ticket.status,
            released_by: admin.email,
        },
        "Ticket released",
    ))
}

pub async fn list_users<S: Store>(
    State(state): State<AppState<S>>,
    AdminUser(_): AdminUser,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<Response, AppError> {
    let skip = page.skip.unwrap_or(0);
    let limit = page.limit.unwrap_or(MAX_PAGE_SIZE);
    if skip < 0 || !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::ValidationError(format!(
            "skip must be >= 0 and limit between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let users = state.store.list_users(skip, limit).await?;
    Ok(success(users, "Users retrieved"))
}

pub async fn change_role<S: Store>(
    State(state): State<AppState<S>>,
    AdminUser(admin): AdminUser,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(body): AppJson<RoleUpdate>,
) -> Result<Response, AppError> {
    if user_id == admin.id && body.role != UserRole::Admin {
        return Err(AppError::ValidationError(
            "You cannot remove your own admin role".to_string(),
        ));
    }

    let user = state
        .store
        .set_role(user_id, body.role)
        .await?
        .ok_or_else(|| user_not_found(user_id))?;

    info!(%user_id, role = ?user.role, admin = %admin.id, "Role changed");
    Ok(success(user, "Role updated"))
}

pub async fn deactivate_user<S: Store>(
    State(state): State<AppState<S>>,
    AdminUser(admin): AdminUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    let user = state
        .store
        .set_active(user_id, false)
        .await?
        .ok_or_else(|| user_not_found(user_id))?;

    info!(%user_id, admin = %admin.id, "User deactivated");
    Ok(success(user, "User deactivated"))
}
