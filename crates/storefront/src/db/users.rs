//! User repository for database operations.
//!
//! Emails are stored normalized (see [`Email`]) and looked up through the
//! unique `lower(email)` index.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use gusturi_core::{AccountStatus, Email, UserId, UserRole};

use super::RepositoryError;
use crate::models::{NewUser, ProfileUpdate, User, UserUpdate};

/// Prefixes a query tail with the column list every `User` is read from.
macro_rules! select_user {
    ($tail:literal) => {
        concat!(
            "SELECT id, name, email, phone, address, city, county, postal_code, ",
            "role, status, registered_at, last_login_at FROM shop.user ",
            $tail
        )
    };
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    county: Option<String>,
    postal_code: Option<String>,
    role: UserRole,
    status: AccountStatus,
    registered_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            phone: row.phone,
            address: row.address,
            city: row.city,
            county: row.county,
            postal_code: row.postal_code,
            role: row.role,
            status: row.status,
            registered_at: row.registered_at,
            last_login_at: row.last_login_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(select_user!("WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(
            r"
            SELECT id, name, email, phone, address, city, county, postal_code,
                   role, status, registered_at, last_login_at, password_hash
            FROM shop.user
            WHERE lower(email) = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((r.user.try_into()?, r.password_hash)))
            .transpose()
    }

    /// Get the password hash of a user by ID, for password changes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM shop.user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(hash)
    }

    /// List every account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(select_user!("ORDER BY registered_at DESC, id DESC"))
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch_last_login(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.user SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Update the fields a user can edit on their own profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        profile: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.user
            SET name = $2, phone = $3, address = $4, city = $5, county = $6, postal_code = $7
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&profile.name)
        .bind(&profile.phone)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.county)
        .bind(&profile.postal_code)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.user SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Update any account field an administrator may change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email belongs to another user.
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update(&self, id: UserId, update: &UserUpdate) -> Result<(), RepositoryError> {
        let profile = &update.profile;
        let result = sqlx::query(
            r"
            UPDATE shop.user
            SET name = $2, email = $3, phone = $4, address = $5, city = $6,
                county = $7, postal_code = $8, status = $9, role = $10
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&profile.name)
        .bind(update.email.as_str())
        .bind(&profile.phone)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.county)
        .bind(&profile.postal_code)
        .bind(update.status)
        .bind(update.role)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "email"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Whether an email is registered to any account other than `except`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_taken_by_other(
        &self,
        email: &Email,
        except: UserId,
    ) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.user WHERE lower(email) = $1 AND id <> $2)",
        )
        .bind(email.as_str())
        .bind(except)
        .fetch_one(self.pool)
        .await?;

        Ok(taken)
    }

    /// Delete an account. Orders keep their history with the user cleared.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Store a reset token digest for an active account.
    ///
    /// Returns the account's ID, or `None` when no active account has this email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_reset_token(
        &self,
        email: &Email,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, UserId>(
            r"
            UPDATE shop.user
            SET reset_token_hash = $2, reset_token_expires_at = $3
            WHERE lower(email) = $1 AND status = 'active'
            RETURNING id
            ",
        )
        .bind(email.as_str())
        .bind(token_hash)
        .bind(expires_at)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Find the active account holding an unexpired reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reset_token(
        &self,
        email: &Email,
        token_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(select_user!(
            "WHERE lower(email) = $1 AND status = 'active' \
             AND reset_token_hash = $2 AND reset_token_expires_at > now()"
        ))
        .bind(email.as_str())
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Set a new password and consume the reset token in one statement.
    ///
    /// Returns the account's ID, or `None` if the token was invalid, expired
    /// or already used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reset_password(
        &self,
        email: &Email,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, UserId>(
            r"
            UPDATE shop.user
            SET password_hash = $3, reset_token_hash = NULL, reset_token_expires_at = NULL
            WHERE lower(email) = $1 AND status = 'active'
              AND reset_token_hash = $2 AND reset_token_expires_at > now()
            RETURNING id
            ",
        )
        .bind(email.as_str())
        .bind(token_hash)
        .bind(password_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Insert a new client account. Runs inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert(conn: &mut PgConnection, new: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shop.user
                (name, email, password_hash, phone, address, city, county, postal_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, email, phone, address, city, county, postal_code,
                      role, status, registered_at, last_login_at
            ",
        )
        .bind(&new.name)
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(&new.city)
        .bind(&new.county)
        .bind(&new.postal_code)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "email"))?;

        row.try_into()
    }

    /// Create an active administrator, or promote and re-key an existing account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_admin(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shop.user (name, email, password_hash, role, status)
            VALUES ($1, $2, $3, 'administrator', 'active')
            ON CONFLICT ((lower(email))) DO UPDATE
            SET name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                role = 'administrator',
                status = 'active'
            RETURNING id, name, email, phone, address, city, county, postal_code,
                      role, status, registered_at, last_login_at
            ",
        )
        .bind(name)
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }
}
