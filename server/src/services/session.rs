//! Session authority: login, validation, refresh and logout.
//!
//! Each account holds at most one live access token, identified by the
//! fingerprint stored on the user row. Login and refresh overwrite it, logout
//! clears it, and validation rejects any token whose fingerprint differs.
//! Refresh tokens are handed back unchanged on refresh and remain usable until
//! they expire.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, validate_password, verify_password_uniform};
use crate::auth::tokens::{fingerprint, fingerprint_matches, TokenIssuer, TokenKind, TokenPair};
use crate::models::{NewUser, User, UserRole};
use crate::store::CredentialStore;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
}

pub struct SessionAuthority<S> {
    store: S,
    tokens: TokenIssuer,
}

fn bad_credentials() -> AppError {
    AppError::AuthError("Incorrect email or password".to_string())
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::ValidationError(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(email)
}

impl<S: CredentialStore> SessionAuthority<S> {
    pub fn new(store: S, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub async fn register(&self, registration: Registration) -> AppResult<User> {
        self.create_account(registration, UserRole::User).await
    }

    pub async fn create_account(
        &self,
        registration: Registration,
        role: UserRole,
    ) -> AppResult<User> {
        let email = normalize_email(&registration.email)?;
        validate_password(&registration.password)?;

        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash: hash_password(&registration.password)?,
                full_name: registration.full_name,
                phone_number: registration.phone_number,
                role,
            })
            .await?;

        info!(user_id = %user.id, role = ?user.role, "Account created");
        Ok(user)
    }

    /// Starts a new session, superseding whatever session the account had.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        let email = email.trim().to_lowercase();
        let found = self.store.find_user_by_email(&email).await?;
        let stored_hash = found.as_ref().map(|user| user.password_hash.as_str());
        if !verify_password_uniform(password, stored_hash) {
            if let Some(user) = &found {
                warn!(user_id = %user.id, "Login failed: wrong password");
            }
            return Err(bad_credentials());
        }
        let user = found.ok_or_else(bad_credentials)?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let access_token = self.tokens.issue(&user.email, TokenKind::Access)?;
        let refresh_token = self.tokens.issue(&user.email, TokenKind::Refresh)?;

        self.store
            .set_token_fingerprint(user.id, Some(&fingerprint(&access_token)))
            .await?;

        info!(user_id = %user.id, "Session started");
        Ok(TokenPair::bearer(access_token, refresh_token))
    }

    /// Resolves a bearer access token to its account.
    pub async fn validate(&self, access_token: &str) -> AppResult<User> {
        let claims = self.tokens.verify(access_token, TokenKind::Access)?;

        let user = self
            .store
            .find_user_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::AuthError("Could not validate credentials".to_string()))?;

        let current = user.active_token_hash.as_deref().unwrap_or_default();
        if current.is_empty() || !fingerprint_matches(access_token, current) {
            return Err(AppError::AuthError(
                "Session superseded or absent, please log in again".to_string(),
            ));
        }

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        Ok(user)
    }

    /// Mints a fresh access token, invalidating the previous one. The refresh
    /// token is returned as-is.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;

        let user = match self.store.find_user_by_email(&claims.sub).await? {
            Some(user) if user.is_active => user,
            _ => return Err(AppError::AuthError("User not available".to_string())),
        };

        let access_token = self.tokens.issue(&user.email, TokenKind::Access)?;
        self.store
            .set_token_fingerprint(user.id, Some(&fingerprint(&access_token)))
            .await?;

        info!(user_id = %user.id, "Access token rotated");
        Ok(TokenPair::bearer(access_token, refresh_token.to_string()))
    }

    pub async fn logout(&self, user: &User) -> AppResult<()> {
        self.store.set_token_fingerprint(user.id, None).await?;
        info!(user_id = %user.id, "Session ended");
        Ok(())
    }

    /// Creates the configured administrator if the email is not yet taken.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> AppResult<Option<Uuid>> {
        if self.store.find_user_by_email(&normalize_email(email)?).await?.is_some() {
            return Ok(None);
        }

        let registration = Registration {
            email: email.to_string(),
            password: password.to_string(),
            full_name: None,
            phone_number: None,
        };
        match self.create_account(registration, UserRole::Admin).await {
            Ok(admin) => Ok(Some(admin.id)),
            // Another instance won the race
            Err(AppError::Conflict(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub fn require_admin(user: &User) -> AppResult<()> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Administrator privileges are required for this action".to_string(),
        ));
    }
    Ok(())
}
