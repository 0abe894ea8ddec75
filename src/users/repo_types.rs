use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Longest first or last name the `users` table accepts.
pub const NAME_COLUMN_MAX: usize = 50;
/// Width of the `users.email` column.
pub const EMAIL_COLUMN_MAX: usize = 120;
/// Width of the `users.user_id` column.
pub const USER_ID_COLUMN_MAX: usize = 64;

// Messages shared by every backend so clients see the same text.
pub const DUPLICATE_USER_ID: &str = "user_id already exists";
pub const DUPLICATE_EMAIL: &str = "email already exists";
pub const VALUE_TOO_LONG: &str = "value exceeds column length";

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i64,                    // generated primary key
    pub user_id: String,            // public identifier, unique
    pub first_name: String,
    pub last_name: String,
    pub email: String,              // unique
    #[serde(skip_serializing)]
    pub encrypted_password: String, // Argon2 hash, not exposed in JSON
}

/// A record that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub encrypted_password: String,
}

impl NewUser {
    /// Column constraints shared by every store backend.
    pub fn check_columns(&self) -> Result<(), AppError> {
        if self.first_name.chars().count() > NAME_COLUMN_MAX {
            return Err(AppError::ConstraintViolation(
                "first_name exceeds 50 characters".into(),
            ));
        }
        if self.last_name.chars().count() > NAME_COLUMN_MAX {
            return Err(AppError::ConstraintViolation(
                "last_name exceeds 50 characters".into(),
            ));
        }
        if self.email.chars().count() > EMAIL_COLUMN_MAX {
            return Err(AppError::ConstraintViolation(
                "email exceeds 120 characters".into(),
            ));
        }
        if self.user_id.chars().count() > USER_ID_COLUMN_MAX {
            return Err(AppError::ConstraintViolation(
                "user_id exceeds 64 characters".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn into_record(self, id: i64) -> UserRecord {
        UserRecord {
            id,
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            encrypted_password: self.encrypted_password,
        }
    }
}
