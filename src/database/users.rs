// ABOUTME: User accounts, pending signups, remember tokens and login history storage
// ABOUTME: Lookups are case-insensitive on username and email
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Utc};
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{LoginRecord, PendingSignup, User};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_schema, format_timestamp, parse_timestamp, parse_uuid};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, mobile, bio, \
     profile_picture, password_hash, is_active, is_admin, email_verified, created_at";

/// Fields needed to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique handle, already sanitised
    pub username: String,
    /// Email address
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: Option<String>,
    /// Phone number
    pub mobile: Option<String>,
    /// bcrypt hash
    pub password_hash: String,
    /// Whether the email is already verified
    pub email_verified: bool,
    /// Global superuser flag
    pub is_admin: bool,
}

/// Editable profile fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Bio
    pub bio: Option<String>,
    /// Phone number
    pub mobile: Option<String>,
    /// Profile picture reference
    pub profile_picture: Option<String>,
}

/// User account database operations
pub struct UserManager {
    pool: SqlitePool,
}

impl UserManager {
    /// Create a new user manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create user tables
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    first_name TEXT NOT NULL,
                    last_name TEXT,
                    mobile TEXT,
                    bio TEXT,
                    profile_picture TEXT,
                    password_hash TEXT NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    email_verified INTEGER NOT NULL DEFAULT 0,
                    email_verified_at TEXT,
                    created_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS pending_signups (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    first_name TEXT NOT NULL,
                    last_name TEXT,
                    mobile TEXT,
                    created_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS remember_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token_hash TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    expires_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS user_login_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    ip_address TEXT,
                    user_agent TEXT,
                    login_at TEXT NOT NULL
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_remember_tokens_user ON remember_tokens(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_login_history_user ON user_login_history(user_id, login_at)",
            ],
        )
        .await
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Insert a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the username or email is taken or the query fails
    pub async fn create_user(&self, new_user: &NewUser) -> AppResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            email: new_user.email.trim().to_lowercase(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            mobile: new_user.mobile.clone(),
            bio: None,
            profile_picture: None,
            password_hash: new_user.password_hash.clone(),
            is_active: true,
            is_admin: new_user.is_admin,
            email_verified: new_user.email_verified,
            created_at: Utc::now(),
        };
        let created_at = format_timestamp(user.created_at);

        sqlx::query(
            r"
            INSERT INTO users (id, username, email, first_name, last_name, mobile, password_hash,
                               is_active, is_admin, email_verified, email_verified_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9, $10, $11)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.mobile)
        .bind(&user.password_hash)
        .bind(i64::from(user.is_admin))
        .bind(i64::from(user.email_verified))
        .bind(user.email_verified.then(|| created_at.clone()))
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::already_exists("Username or email already registered")
            }
            other => AppError::database(format!("Failed to create user: {other}")),
        })?;

        Ok(user)
    }

    /// Get a user by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;
        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    /// Get a user by username (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 COLLATE NOCASE"
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user by username: {e}")))?;
        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    /// Get a user by email (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 COLLATE NOCASE"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user by email: {e}")))?;
        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    /// Resolve a login identifier, which may be a username or an email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        if identifier.contains('@') {
            self.get_user_by_email(identifier).await
        } else {
            self.get_user_by_username(identifier).await
        }
    }

    /// Whether a username is taken by a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn username_exists(&self, username: &str) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = $1 COLLATE NOCASE")
                .bind(username)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to check username: {e}")))?;
        Ok(count > 0)
    }

    /// Resolve many usernames to ids; unknown names are returned separately
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn resolve_usernames(
        &self,
        usernames: &[String],
    ) -> AppResult<(Vec<User>, Vec<String>)> {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for name in usernames {
            match self.get_user_by_username(name).await? {
                Some(user) => found.push(user),
                None => missing.push(name.clone()),
            }
        }
        Ok((found, missing))
    }

    /// List all users, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list users: {e}")))?;
        rows.iter().map(Self::row_to_user).collect()
    }

    /// Ids of all active users
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_active_user_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM users WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list active users: {e}")))?;
        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    /// Apply profile changes and return the updated user
    ///
    /// # Errors
    ///
    /// Returns an error if the user is missing or the query fails
    pub async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> AppResult<User> {
        sqlx::query(
            r"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                bio = COALESCE($4, bio),
                mobile = COALESCE($5, mobile),
                profile_picture = COALESCE($6, profile_picture)
            WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.bio)
        .bind(&update.mobile)
        .bind(&update.profile_picture)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update profile: {e}")))?;

        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Replace the password hash
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id.to_string())
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update password: {e}")))?;
        Ok(())
    }

    /// Activate or deactivate an account; returns whether a row changed
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn set_active(&self, user_id: Uuid, active: bool) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(user_id.to_string())
            .bind(i64::from(active))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update account status: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Grant or revoke the superuser flag
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> AppResult<()> {
        sqlx::query("UPDATE users SET is_admin = $2 WHERE id = $1")
            .bind(user_id.to_string())
            .bind(i64::from(is_admin))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update admin flag: {e}")))?;
        Ok(())
    }

    /// Delete a user; dependent rows go with it.
    ///
    /// Fails while the user still created a community or group chat; see
    /// `accounts::delete_account` for the handover.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_user(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete user: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of user accounts
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_users(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count users: {e}")))
    }

    fn row_to_user(row: &SqliteRow) -> AppResult<User> {
        let id: String = row.get("id");
        let created_at: String = row.get("created_at");
        Ok(User {
            id: parse_uuid(&id)?,
            username: row.get("username"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            mobile: row.get("mobile"),
            bio: row.get("bio"),
            profile_picture: row.get("profile_picture"),
            password_hash: row.get("password_hash"),
            is_active: row.get::<i64, _>("is_active") != 0,
            is_admin: row.get::<i64, _>("is_admin") != 0,
            email_verified: row.get::<i64, _>("email_verified") != 0,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================================================================
    // Pending signups
    // ========================================================================

    /// Store a pending signup, replacing any earlier one for the same email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn upsert_pending_signup(&self, signup: &NewUser) -> AppResult<PendingSignup> {
        let email = signup.email.trim().to_lowercase();
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM pending_signups WHERE email = $1 COLLATE NOCASE")
            .bind(&email)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to clear pending signup: {e}")))?;

        let result = sqlx::query(
            r"
            INSERT INTO pending_signups (username, email, password_hash, first_name, last_name, mobile, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&signup.username)
        .bind(&email)
        .bind(&signup.password_hash)
        .bind(&signup.first_name)
        .bind(&signup.last_name)
        .bind(&signup.mobile)
        .bind(format_timestamp(now))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to store pending signup: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit pending signup: {e}")))?;

        Ok(PendingSignup {
            id: result.last_insert_rowid(),
            username: signup.username.clone(),
            email,
            password_hash: signup.password_hash.clone(),
            first_name: signup.first_name.clone(),
            last_name: signup.last_name.clone(),
            mobile: signup.mobile.clone(),
            created_at: now,
        })
    }

    /// Get a pending signup by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_pending_signup(&self, id: i64) -> AppResult<Option<PendingSignup>> {
        let row = sqlx::query("SELECT * FROM pending_signups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get pending signup: {e}")))?;
        row.map(|r| Self::row_to_pending(&r)).transpose()
    }

    /// Get a pending signup by email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_pending_signup_by_email(&self, email: &str) -> AppResult<Option<PendingSignup>> {
        let row = sqlx::query("SELECT * FROM pending_signups WHERE email = $1 COLLATE NOCASE")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get pending signup: {e}")))?;
        row.map(|r| Self::row_to_pending(&r)).transpose()
    }

    /// Remove a pending signup
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_pending_signup(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM pending_signups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete pending signup: {e}")))?;
        Ok(())
    }

    fn row_to_pending(row: &SqliteRow) -> AppResult<PendingSignup> {
        let created_at: String = row.get("created_at");
        Ok(PendingSignup {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            mobile: row.get("mobile"),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================================================================
    // Remember tokens
    // ========================================================================

    /// Store the hash of a remember token
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn store_remember_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO remember_tokens (user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(user_id.to_string())
        .bind(token_hash)
        .bind(format_timestamp(Utc::now()))
        .bind(format_timestamp(expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to store remember token: {e}")))?;
        Ok(())
    }

    /// User owning an unexpired remember token hash
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn find_remember_token_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>> {
        let user_id: Option<String> = sqlx::query_scalar(
            "SELECT user_id FROM remember_tokens WHERE token_hash = $1 AND expires_at > $2",
        )
        .bind(token_hash)
        .bind(format_timestamp(now))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up remember token: {e}")))?;
        user_id.as_deref().map(parse_uuid).transpose()
    }

    /// Delete a remember token by hash
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_remember_token(&self, token_hash: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM remember_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete remember token: {e}")))?;
        Ok(())
    }

    /// Delete every remember token of a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_user_remember_tokens(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM remember_tokens WHERE user_id = $1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete remember tokens: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Purge expired remember tokens
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_expired_remember_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM remember_tokens WHERE expires_at <= $1")
            .bind(format_timestamp(now))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to purge remember tokens: {e}")))?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Login history
    // ========================================================================

    /// Record a successful login
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn record_login(
        &self,
        user_id: Uuid,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_login_history (user_id, ip_address, user_agent, login_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(user_id.to_string())
        .bind(ip_address)
        .bind(user_agent)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to record login: {e}")))?;
        Ok(())
    }

    /// Most recent logins of a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn recent_logins(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<LoginRecord>> {
        let rows = sqlx::query(
            r"
            SELECT u.username, h.ip_address, h.user_agent, h.login_at
            FROM user_login_history h
            JOIN users u ON u.id = h.user_id
            WHERE h.user_id = $1
            ORDER BY h.login_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get login history: {e}")))?;

        rows.iter()
            .map(|row| {
                let login_at: String = row.get("login_at");
                Ok(LoginRecord {
                    username: row.get("username"),
                    ip_address: row.get("ip_address"),
                    user_agent: row.get("user_agent"),
                    login_at: parse_timestamp(&login_at)?,
                })
            })
            .collect()
    }
}
