use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password, verify_against_dummy, verify_password},
        JwtKeys,
    },
    error::{AppError, AppResult},
    users::{
        dto::{RegisterRequest, UserResponse},
        repo::UserStore,
        repo_types::NewUser,
        validation::validate_registration,
    },
};

/// Token issued by a successful login, scoped to the user's public id.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

/// Validates, hashes and stores a new user, returning its public projection.
pub async fn register(store: &dyn UserStore, mut req: RegisterRequest) -> AppResult<UserResponse> {
    req.email = req.email.trim().to_string();
    req.first_name = req.first_name.trim().to_string();
    req.last_name = req.last_name.trim().to_string();

    if let Err(errors) = validate_registration(&req) {
        warn!(%errors, "registration rejected");
        return Err(errors.into());
    }

    let encrypted_password = hash_password(&req.password)?;
    let new_user = NewUser {
        user_id: Uuid::new_v4().to_string(),
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        encrypted_password,
    };

    let user = store.insert(new_user).await.map_err(|e| {
        if let AppError::ConstraintViolation(reason) = &e {
            warn!(%reason, "user insert violated a constraint");
        }
        e
    })?;

    info!(user_id = %user.user_id, email = %user.email, "user registered");
    Ok(user.into())
}

/// Checks credentials and issues a token. Unknown email and wrong password
/// fail identically.
pub async fn authenticate(
    store: &dyn UserStore,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> AppResult<Session> {
    let email = email.trim();

    let Some(user) = store.find_by_email(email).await? else {
        verify_against_dummy(password);
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.encrypted_password)? {
        warn!(%email, user_id = %user.user_id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = keys.issue(&user.user_id)?;
    info!(user_id = %user.user_id, "user logged in");
    Ok(Session {
        token,
        user_id: user.user_id,
    })
}

/// Every user, or only those whose email ends with `email_suffix`.
pub async fn list_users(
    store: &dyn UserStore,
    email_suffix: Option<&str>,
) -> AppResult<Vec<UserResponse>> {
    let users = match email_suffix {
        Some(suffix) => store.find_all_by_email_suffix(suffix).await?,
        None => store.list_all().await?,
    };
    Ok(users.into_iter().map(UserResponse::from).collect())
}

pub async fn get_user(store: &dyn UserStore, user_id: &str) -> AppResult<UserResponse> {
    store
        .find_by_user_id(user_id)
        .await?
        .map(UserResponse::from)
        .ok_or(AppError::NotFound)
}
