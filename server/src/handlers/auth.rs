use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::services::Registration;
use crate::state::AppState;
use crate::store::Store;
use crate::utils::response::{created, empty_success, success};
use crate::utils::{AppError, AppForm, AppJson};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
}

/// OAuth2 password-grant form; `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<Response, AppError> {
    let user = state
        .sessions
        .register(Registration {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
            phone_number: body.phone_number,
        })
        .await?;

    Ok(created(user, "User created successfully"))
}

pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    AppForm(form): AppForm<LoginForm>,
) -> Result<Response, AppError> {
    let tokens = state.sessions.login(&form.username, &form.password).await?;
    Ok(success(tokens, "Login successful"))
}

pub async fn refresh<S: Store>(
    State(state): State<AppState<S>>,
    AppJson(body): AppJson<RefreshRequest>,
) -> Result<Response, AppError> {
    let tokens = state.sessions.refresh(&body.refresh_token).await?;
    Ok(success(tokens, "Access token refreshed"))
}

pub async fn logout<S: Store>(
    State(state): State<AppState<S>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    state.sessions.logout(&user).await?;
    Ok(empty_success("Session closed, token invalidated"))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Response {
    success(user, "Authenticated user")
}
