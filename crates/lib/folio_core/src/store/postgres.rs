//! PostgreSQL storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{EMAIL_TAKEN, USERNAME_TAKEN, UserStore};
use crate::auth::AuthError;
use crate::auth::tokens::hash_token;
use crate::models::auth::{
    NewResetToken, NewUser, ResetTokenRecord, User, UserRecord, VerificationTokenRecord,
};
use crate::reset_tokens::PasswordResetTokenStore;
use crate::uuid::uuidv7;
use crate::verification::EmailVerificationStore;

type UserRow = (Uuid, String, String, String, bool, DateTime<Utc>);

type ResetRow = (
    Uuid,
    Uuid,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    Option<String>,
    Option<String>,
);

type VerificationRow = (
    Uuid,
    Uuid,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

const USER_COLUMNS: &str = "id, email, username, password_hash, email_verified, created_at";

const RESET_COLUMNS: &str =
    "id, user_id, token_hash, expires_at, used_at, created_at, request_ip, request_user_agent";

const VERIFICATION_COLUMNS: &str = "id, user_id, token_hash, expires_at, used_at, created_at";

/// Storage backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: UserRow) -> UserRecord {
    let (id, email, username, password_hash, email_verified, created_at) = row;
    UserRecord {
        user: User {
            id,
            email,
            username,
            email_verified,
            created_at,
        },
        password_hash,
    }
}

fn reset_from_row(row: ResetRow) -> ResetTokenRecord {
    let (id, user_id, token_hash, expires_at, used_at, created_at, request_ip, request_user_agent) =
        row;
    ResetTokenRecord {
        id,
        user_id,
        token_hash,
        expires_at,
        used_at,
        created_at,
        request_ip,
        request_user_agent,
    }
}

fn verification_from_row(row: VerificationRow) -> VerificationTokenRecord {
    let (id, user_id, token_hash, expires_at, used_at, created_at) = row;
    VerificationTokenRecord {
        id,
        user_id,
        token_hash,
        expires_at,
        used_at,
        created_at,
    }
}

/// Map unique violations on `users` to `Conflict`.
fn map_user_insert_error(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return match db.constraint() {
            Some("users_username_lower_key") => AuthError::Conflict(USERNAME_TAKEN.into()),
            _ => AuthError::Conflict(EMAIL_TAKEN.into()),
        };
    }
    AuthError::DbError(e)
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn create_user(&self, new: NewUser) -> Result<UserRecord, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, username, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_insert_error)?;
        Ok(user_from_row(row))
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("user not found".into()));
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("user not found".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PasswordResetTokenStore for PgStore {
    async fn create(&self, new: NewResetToken) -> Result<ResetTokenRecord, AuthError> {
        let row = sqlx::query_as::<_, ResetRow>(&format!(
            "INSERT INTO password_reset_tokens \
             (id, user_id, token_hash, expires_at, request_ip, request_user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {RESET_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(new.user_id)
        .bind(hash_token(&new.token))
        .bind(new.expires_at)
        .bind(new.request_ip.as_deref())
        .bind(new.request_user_agent.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(reset_from_row(row))
    }

    async fn get_valid_token(&self, token: &str) -> Result<Option<ResetTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, ResetRow>(&format!(
            "SELECT {RESET_COLUMNS} FROM password_reset_tokens \
             WHERE token_hash = $1 \
               AND used_at IS NULL \
               AND expires_at > now()"
        ))
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(reset_from_row))
    }

    async fn mark_used(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE password_reset_tokens SET used_at = now() \
             WHERE token_hash = $1 AND used_at IS NULL",
        )
        .bind(hash_token(token))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn invalidate_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used_at = now() \
             WHERE user_id = $1 AND used_at IS NULL AND expires_at > now()",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn cleanup_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "DELETE FROM password_reset_tokens \
             WHERE used_at IS NOT NULL OR expires_at <= now()",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EmailVerificationStore for PgStore {
    async fn create_verification(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationTokenRecord, AuthError> {
        let row = sqlx::query_as::<_, VerificationRow>(&format!(
            "INSERT INTO email_verification_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {VERIFICATION_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(verification_from_row(row))
    }

    async fn get_valid_verification(
        &self,
        token: &str,
    ) -> Result<Option<VerificationTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, VerificationRow>(&format!(
            "SELECT {VERIFICATION_COLUMNS} FROM email_verification_tokens \
             WHERE token_hash = $1 \
               AND used_at IS NULL \
               AND expires_at > now()"
        ))
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(verification_from_row))
    }

    async fn mark_verification_used(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE email_verification_tokens SET used_at = now() \
             WHERE token_hash = $1 AND used_at IS NULL",
        )
        .bind(hash_token(token))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn invalidate_verifications_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE email_verification_tokens SET used_at = now() \
             WHERE user_id = $1 AND used_at IS NULL AND expires_at > now()",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn cleanup_expired_verifications(&self) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "DELETE FROM email_verification_tokens \
             WHERE used_at IS NOT NULL OR expires_at <= now()",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
