use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::users::repo_types::{
    NewUser, UserRecord, DUPLICATE_EMAIL, DUPLICATE_USER_ID, VALUE_TOO_LONG,
};

/// Persistence of user records.
///
/// `insert` is atomic: it either stores the whole record or fails with
/// [`AppError::ConstraintViolation`] when the public id or email is taken or a
/// name column is too long. Lookups are exact and case-sensitive.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<UserRecord>>;

    /// Any one record whose email ends with `suffix` (literal match).
    async fn find_by_email_suffix(&self, suffix: &str) -> AppResult<Option<UserRecord>>;

    /// Every record whose email ends with `suffix` (literal match).
    async fn find_all_by_email_suffix(&self, suffix: &str) -> AppResult<Vec<UserRecord>>;

    async fn list_all(&self) -> AppResult<Vec<UserRecord>>;
}

// ---- Postgres ----

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// SQLSTATEs raised by the `users` table constraints.
const UNIQUE_VIOLATION: &str = "23505";
const STRING_TOO_LONG: &str = "22001";
const CHECK_VIOLATION: &str = "23514";

/// Client-facing text for a constraint failure; schema names never leave here.
fn constraint_message(code: &str, constraint: Option<&str>) -> Option<&'static str> {
    match (code, constraint) {
        (UNIQUE_VIOLATION, Some("users_email_key")) => Some(DUPLICATE_EMAIL),
        (UNIQUE_VIOLATION, Some("users_user_id_key")) => Some(DUPLICATE_USER_ID),
        (UNIQUE_VIOLATION, _) => Some("value already exists"),
        (STRING_TOO_LONG, _) => Some(VALUE_TOO_LONG),
        (CHECK_VIOLATION, _) => Some("value rejected by a check constraint"),
        _ => None,
    }
}

fn map_insert_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        let message = db_err
            .code()
            .and_then(|code| constraint_message(&code, db_err.constraint()));
        if let Some(message) = message {
            debug!(detail = %db_err.message(), "insert rejected by constraint");
            return AppError::ConstraintViolation(message.to_string());
        }
    }
    AppError::Internal(anyhow::Error::new(e).context("insert user"))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord> {
        user.check_columns()?;
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (user_id, first_name, last_name, email, encrypted_password)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, first_name, last_name, email, encrypted_password
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.encrypted_password)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        debug!(id = record.id, user_id = %record.user_id, "user row inserted");
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, user_id, first_name, last_name, email, encrypted_password
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, user_id, first_name, last_name, email, encrypted_password
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find user by user_id")?;
        Ok(user)
    }

    async fn find_by_email_suffix(&self, suffix: &str) -> AppResult<Option<UserRecord>> {
        // right() instead of LIKE so '%' and '_' in the suffix stay literal
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, user_id, first_name, last_name, email, encrypted_password
            FROM users
            WHERE right(email, char_length($1)) = $1
            LIMIT 1
            "#,
        )
        .bind(suffix)
        .fetch_optional(&self.db)
        .await
        .context("find user by email suffix")?;
        Ok(user)
    }

    async fn find_all_by_email_suffix(&self, suffix: &str) -> AppResult<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, user_id, first_name, last_name, email, encrypted_password
            FROM users
            WHERE right(email, char_length($1)) = $1
            "#,
        )
        .bind(suffix)
        .fetch_all(&self.db)
        .await
        .context("find users by email suffix")?;
        Ok(users)
    }

    async fn list_all(&self) -> AppResult<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, user_id, first_name, last_name, email, encrypted_password
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }
}

// ---- In-memory ----

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    rows: BTreeMap<i64, UserRecord>,
    by_email: HashMap<String, i64>,
    by_user_id: HashMap<String, i64>,
}

impl Tables {
    fn row(&self, id: Option<&i64>) -> Option<UserRecord> {
        id.and_then(|id| self.rows.get(id)).cloned()
    }
}

/// In-memory store with email and public-id indexes, for development and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord> {
        user.check_columns()?;

        let mut t = self.tables.write().await;
        if t.by_user_id.contains_key(&user.user_id) {
            return Err(AppError::ConstraintViolation(DUPLICATE_USER_ID.into()));
        }
        if t.by_email.contains_key(&user.email) {
            return Err(AppError::ConstraintViolation(DUPLICATE_EMAIL.into()));
        }

        t.last_id += 1;
        let id = t.last_id;
        let record = user.into_record(id);
        t.by_user_id.insert(record.user_id.clone(), id);
        t.by_email.insert(record.email.clone(), id);
        t.rows.insert(id, record.clone());

        debug!(id, user_id = %record.user_id, "user row inserted");
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let t = self.tables.read().await;
        Ok(t.row(t.by_email.get(email)))
    }

    async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        let t = self.tables.read().await;
        Ok(t.row(t.by_user_id.get(user_id)))
    }

    async fn find_by_email_suffix(&self, suffix: &str) -> AppResult<Option<UserRecord>> {
        let t = self.tables.read().await;
        Ok(t.rows.values().find(|u| u.email.ends_with(suffix)).cloned())
    }

    async fn find_all_by_email_suffix(&self, suffix: &str) -> AppResult<Vec<UserRecord>> {
        let t = self.tables.read().await;
        Ok(t.rows
            .values()
            .filter(|u| u.email.ends_with(suffix))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<UserRecord>> {
        let t = self.tables.read().await;
        Ok(t.rows.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_user(first: &str, last: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            user_id: Uuid::new_v4().to_string(),
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            encrypted_password: password.into(),
        }
    }

    async fn seeded() -> (InMemoryUserStore, UserRecord, UserRecord) {
        let store = InMemoryUserStore::new();
        let john = store
            .insert(new_user("john", "smith", "jones@mail.net", "12345678"))
            .await
            .unwrap();
        let maria = store
            .insert(new_user("maria", "jones", "mariaj@test.com", "87654321"))
            .await
            .unwrap();
        (store, john, maria)
    }

    #[tokio::test]
    async fn insert_returns_stored_fields() {
        let store = InMemoryUserStore::new();
        let user = new_user("john", "smith", "jones@test.com", "12345678");
        let stored = store.insert(user.clone()).await.unwrap();

        assert!(stored.id > 0);
        assert_eq!(stored.user_id, user.user_id);
        assert_eq!(stored.first_name, user.first_name);
        assert_eq!(stored.last_name, user.last_name);
        assert_eq!(stored.email, user.email);
        assert_eq!(stored.encrypted_password, user.encrypted_password);
    }

    #[tokio::test]
    async fn ids_are_positive_and_unique() {
        let (_, john, maria) = seeded().await;
        assert!(john.id > 0);
        assert!(maria.id > john.id);
    }

    #[tokio::test]
    async fn rejects_first_name_longer_than_50() {
        let store = InMemoryUserStore::new();
        let user = new_user(&"john".repeat(13), "smith", "jones@test.com", "12345678");
        let err = store.insert(user).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_last_name_longer_than_50() {
        let store = InMemoryUserStore::new();
        let user = new_user("john", &"s".repeat(51), "jones@test.com", "12345678");
        let err = store.insert(user).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn rejects_duplicate_user_id_and_keeps_first() {
        let store = InMemoryUserStore::new();
        let first = store
            .insert(new_user("john", "smith", "jones@test.com", "12345678"))
            .await
            .unwrap();

        let mut second = new_user("maria", "jonson", "mariajtest@email.com", "pass1234");
        second.user_id = first.user_id.clone();
        let err = store.insert(second).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));

        let found = store.find_by_user_id(&first.user_id).await.unwrap();
        assert_eq!(found, Some(first));
        assert!(store
            .find_by_email("mariajtest@email.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn email_length_boundary_matches_column() {
        let store = InMemoryUserStore::new();
        let domain = "@email.com";
        let fits = format!("{}{}", "a".repeat(120 - domain.len()), domain);
        assert_eq!(fits.chars().count(), 120);
        store
            .insert(new_user("john", "smith", &fits, "12345678"))
            .await
            .unwrap();

        let too_long = format!("b{}", fits);
        let err = store
            .insert(new_user("maria", "jones", &too_long, "12345678"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[test]
    fn constraint_messages_hide_schema_names() {
        assert_eq!(
            constraint_message(UNIQUE_VIOLATION, Some("users_email_key")),
            Some(DUPLICATE_EMAIL)
        );
        assert_eq!(
            constraint_message(UNIQUE_VIOLATION, Some("users_user_id_key")),
            Some(DUPLICATE_USER_ID)
        );
        assert_eq!(constraint_message(STRING_TOO_LONG, None), Some(VALUE_TOO_LONG));
        for message in [
            constraint_message(UNIQUE_VIOLATION, Some("some_other_idx")),
            constraint_message(CHECK_VIOLATION, Some("users_chk")),
        ] {
            assert!(!message.unwrap().contains("users_"));
        }
        assert_eq!(constraint_message("08006", None), None);
    }

    #[tokio::test]
    async fn in_memory_duplicates_use_shared_messages() {
        let store = InMemoryUserStore::new();
        let first = store
            .insert(new_user("john", "smith", "jones@test.com", "12345678"))
            .await
            .unwrap();
        match store
            .insert(new_user("maria", "jones", "jones@test.com", "x"))
            .await
        {
            Err(AppError::ConstraintViolation(m)) => assert_eq!(m, DUPLICATE_EMAIL),
            other => panic!("unexpected result: {:?}", other.map(|u| u.id)),
        }
        let mut same_id = new_user("maria", "jones", "maria@test.com", "x");
        same_id.user_id = first.user_id;
        match store.insert(same_id).await {
            Err(AppError::ConstraintViolation(m)) => assert_eq!(m, DUPLICATE_USER_ID),
            other => panic!("unexpected result: {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let store = InMemoryUserStore::new();
        store
            .insert(new_user("john", "smith", "jones@test.com", "12345678"))
            .await
            .unwrap();
        let err = store
            .insert(new_user("maria", "jonson", "jones@test.com", "pass1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_by_email_is_exact() {
        let (store, john, _) = seeded().await;
        let found = store.find_by_email(&john.email).await.unwrap().unwrap();
        assert_eq!(found.email, john.email);
        assert!(store.find_by_email("JONES@mail.net").await.unwrap().is_none());
        assert!(store.find_by_email("jones@mail").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_user_id_returns_record() {
        let (store, john, _) = seeded().await;
        let found = store.find_by_user_id(&john.user_id).await.unwrap().unwrap();
        assert_eq!(found.user_id, john.user_id);
        assert!(store.find_by_user_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_email_suffix_returns_match() {
        let (store, john, _) = seeded().await;
        let found = store.find_by_email_suffix(".net").await.unwrap().unwrap();
        assert_eq!(found.email, john.email);
        assert!(store.find_by_email_suffix(".NET").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_all_by_email_suffix_filters_domain() {
        let (store, _, _) = seeded().await;
        let domain = "@test.com";
        let users = store.find_all_by_email_suffix(domain).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users.iter().all(|u| u.email.ends_with(domain)));
    }

    #[tokio::test]
    async fn suffix_is_not_a_pattern() {
        let (store, _, _) = seeded().await;
        assert!(store.find_by_email_suffix("%.com").await.unwrap().is_none());
        assert!(store
            .find_all_by_email_suffix("_test.com")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn list_all_returns_every_record() {
        let (store, john, maria) = seeded().await;
        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![john, maria]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_on_same_email_have_one_winner() {
        let store = InMemoryUserStore::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(new_user("john", &format!("smith{}", i), "race@test.com", "x"))
                    .await
            }));
        }
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert!(matches!(e, AppError::ConstraintViolation(_))),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
