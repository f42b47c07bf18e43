//! Authentication service.
//!
//! Password login, signup, password changes and the password reset flow.
//! Every password is hashed with Argon2id.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use gusturi_core::{Email, UserId};

use crate::db::{LoyaltyRepository, RepositoryError, UserRepository};
use crate::models::{NewUser, ProfileUpdate, User};
use crate::services::optional_field;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// How long a password reset link stays valid, in hours.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Signup form input, before validation.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
}

/// A freshly issued password reset token.
#[derive(Debug, Clone)]
pub struct IssuedResetToken {
    pub user_id: UserId,
    /// The secret sent to the user; only its digest is stored.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Signup & Login
    // =========================================================================

    /// Register a new client account with an empty loyalty balance.
    ///
    /// Input is fully validated before the database is touched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields`, `InvalidEmail`, `PasswordMismatch` or
    /// `WeakPassword` for invalid input, in that order of precedence.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let first_name = registration.first_name.trim();
        let last_name = registration.last_name.trim();
        if first_name.is_empty()
            || last_name.is_empty()
            || registration.email.trim().is_empty()
            || registration.password.is_empty()
            || registration.password_confirm.is_empty()
        {
            return Err(AuthError::MissingFields);
        }

        let email = Email::parse(&registration.email)?;
        validate_new_password(&registration.password, &registration.password_confirm)?;
        let password_hash = hash_password(&registration.password)?;

        let new_user = NewUser {
            name: format!("{first_name} {last_name}"),
            email,
            password_hash,
            phone: optional_field(&registration.phone),
            address: optional_field(&registration.address),
            city: optional_field(&registration.city),
            county: optional_field(&registration.county),
            postal_code: optional_field(&registration.postal_code),
        };

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let user = UserRepository::insert(&mut tx, &new_user)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;
        LoyaltyRepository::create_empty(&mut tx, user.id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(user)
    }

    /// Login with email and password, recording the login time.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` if either field is empty.
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::InactiveAccount` if the password is right but the
    /// account is deactivated.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.status.is_active() {
            return Err(AuthError::InactiveAccount);
        }

        self.users.touch_last_login(user.id).await?;

        Ok(user)
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository(RepositoryError::NotFound)` if the user
    /// no longer exists.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::Repository(RepositoryError::NotFound))
    }

    /// Update the caller's own profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` if the name is empty.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        profile: &ProfileUpdate,
    ) -> Result<(), AuthError> {
        if profile.name.trim().is_empty() {
            return Err(AuthError::MissingFields);
        }
        self.users.update_profile(user_id, profile).await?;
        Ok(())
    }

    /// Change a password after verifying the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WrongCurrentPassword` if `current` does not verify.
    /// Returns `AuthError::PasswordMismatch` or `WeakPassword` for an invalid new password.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        if current.is_empty() || new.is_empty() || confirm.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let hash = self
            .users
            .get_password_hash(user_id)
            .await?
            .ok_or(AuthError::Repository(RepositoryError::NotFound))?;
        verify_password(current, &hash).map_err(|_| AuthError::WrongCurrentPassword)?;

        validate_new_password(new, confirm)?;
        let new_hash = hash_password(new)?;
        self.users.update_password_hash(user_id, &new_hash).await?;

        Ok(())
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token for an active account.
    ///
    /// Returns `None` when no active account has this email; callers must
    /// respond identically in both cases.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` or `InvalidEmail` for bad input.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<IssuedResetToken>, AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::MissingFields);
        }
        let email = Email::parse(email)?;

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        let user_id = self
            .users
            .set_reset_token(&email, &hash_reset_token(&token), expires_at)
            .await?;

        Ok(user_id.map(|user_id| IssuedResetToken {
            user_id,
            token,
            expires_at,
        }))
    }

    /// Check a reset link without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the token is unknown, expired
    /// or already used, or the account is inactive.
    pub async fn verify_reset_token(&self, email: &str, token: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidResetToken)?;
        if token.is_empty() {
            return Err(AuthError::InvalidResetToken);
        }

        self.users
            .get_by_reset_token(&email, &hash_reset_token(token))
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }

    /// Set a new password through a reset link, consuming the token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields`, `PasswordMismatch` or `WeakPassword`
    /// for an invalid password, and `AuthError::InvalidResetToken` if the token
    /// is no longer valid.
    pub async fn reset_password(
        &self,
        email: &str,
        token: &str,
        password: &str,
        confirm: &str,
    ) -> Result<UserId, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidResetToken)?;
        if password.is_empty() || confirm.is_empty() {
            return Err(AuthError::MissingFields);
        }
        validate_new_password(password, confirm)?;
        let password_hash = hash_password(password)?;

        self.users
            .reset_password(&email, &hash_reset_token(token), &password_hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate a new password and its confirmation.
///
/// # Errors
///
/// Returns `AuthError::PasswordMismatch` if they differ, then
/// `AuthError::WeakPassword` if the password is too short.
pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// 32 random bytes, hex encoded.
fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 digest of a reset token, hex encoded. Only digests are stored.
#[must_use]
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_new_password_checks_match_first() {
        assert!(matches!(
            validate_new_password("abc", "abd"),
            Err(AuthError::PasswordMismatch)
        ));
    }

    #[test]
    fn test_validate_new_password_min_length() {
        assert!(matches!(
            validate_new_password("12345", "12345"),
            Err(AuthError::WeakPassword { min: 6 })
        ));
        assert!(validate_new_password("123456", "123456").is_ok());
    }

    #[test]
    fn test_validate_new_password_counts_characters_not_bytes() {
        // Five characters, ten bytes.
        assert!(validate_new_password("ăîșțâ", "ăîșțâ").is_err());
        assert!(validate_new_password("ăîșțâx", "ăîșțâx").is_ok());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("sarmale123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("sarmale123", &hash).is_ok());
        assert!(matches!(
            verify_password("mici123", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_legacy_hash_format() {
        // An unsalted digest is not a PHC string and never verifies.
        assert!(verify_password("parola", "e10adc3949ba59abbe56e057f20f883e").is_err());
    }

    #[test]
    fn test_reset_tokens_are_random_and_hex() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_reset_token_is_stable_and_differs_from_token() {
        let token = generate_reset_token();
        assert_eq!(hash_reset_token(&token), hash_reset_token(&token));
        assert_ne!(hash_reset_token(&token), token);
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

}
