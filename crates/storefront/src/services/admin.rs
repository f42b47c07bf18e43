//! Back-office account management.

use sqlx::PgPool;
use thiserror::Error;

use gusturi_core::{AccountStatus, Email, EmailError, UserId, UserRole};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{ProfileUpdate, User, UserUpdate};
use crate::services::optional_field;

/// Errors from administrator account edits.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("name and email are required")]
    MissingFields,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("email belongs to another user")]
    EmailTaken,

    #[error("administrators cannot delete their own account")]
    SelfDelete,

    #[error("user not found")]
    UserNotFound,

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AdminError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::UserNotFound,
            RepositoryError::Conflict(_) => Self::EmailTaken,
            other => Self::Repository(other),
        }
    }
}

impl AdminError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingFields => "Numele și email-ul sunt obligatorii.".to_string(),
            Self::InvalidEmail(_) => "Adresa de email nu este validă.".to_string(),
            Self::EmailTaken => {
                "Această adresă de email este deja folosită de alt utilizator.".to_string()
            }
            Self::SelfDelete => "Nu poți șterge propriul cont de administrator.".to_string(),
            Self::UserNotFound => "Utilizatorul nu a fost găsit.".to_string(),
            Self::Repository(_) => {
                "A apărut o eroare. Te rugăm să încerci din nou mai târziu.".to_string()
            }
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Repository(_))
    }
}

/// Raw edit form for an account.
#[derive(Debug, Clone, Default)]
pub struct UserEdit {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
    pub role: UserRole,
    pub status: AccountStatus,
}

impl UserEdit {
    /// Validate the form into a [`UserUpdate`].
    ///
    /// # Errors
    ///
    /// Returns `AdminError::MissingFields` or `InvalidEmail`.
    pub fn validate(&self) -> Result<UserUpdate, AdminError> {
        let name = self.name.trim();
        if name.is_empty() || self.email.trim().is_empty() {
            return Err(AdminError::MissingFields);
        }
        let email = Email::parse(&self.email)?;

        Ok(UserUpdate {
            profile: ProfileUpdate {
                name: name.to_string(),
                phone: optional_field(&self.phone),
                address: optional_field(&self.address),
                city: optional_field(&self.city),
                county: optional_field(&self.county),
                postal_code: optional_field(&self.postal_code),
            },
            email,
            role: self.role,
            status: self.status,
        })
    }
}

/// Account management for administrators.
pub struct AdminService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// All accounts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Repository` if the query fails.
    pub async fn list_users(&self) -> Result<Vec<User>, AdminError> {
        Ok(self.users.list_all().await?)
    }

    /// One account.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserNotFound` if there is no such account.
    pub async fn get_user(&self, id: UserId) -> Result<User, AdminError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(AdminError::UserNotFound)
    }

    /// Apply an edit to any account.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::MissingFields`, `InvalidEmail` or `EmailTaken` for
    /// bad input and `AdminError::UserNotFound` if the account is gone.
    pub async fn update_user(&self, id: UserId, edit: &UserEdit) -> Result<UserUpdate, AdminError> {
        let update = edit.validate()?;

        if self.users.email_taken_by_other(&update.email, id).await? {
            return Err(AdminError::EmailTaken);
        }
        // The unique index still catches a concurrent registration of the same email.
        self.users.update(id, &update).await?;

        Ok(update)
    }

    /// Delete an account other than the caller's own. Returns the deleted name.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::SelfDelete` or `AdminError::UserNotFound`.
    pub async fn delete_user(&self, actor: UserId, id: UserId) -> Result<String, AdminError> {
        if actor == id {
            return Err(AdminError::SelfDelete);
        }
        let user = self.get_user(id).await?;
        self.users.delete(id).await?;

        Ok(user.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(name: &str, email: &str) -> UserEdit {
        UserEdit {
            name: name.to_string(),
            email: email.to_string(),
            phone: " 0722 000 111 ".to_string(),
            ..UserEdit::default()
        }
    }

    #[test]
    fn test_validate_requires_name_and_email() {
        assert!(matches!(
            edit("  ", "ion@example.ro").validate(),
            Err(AdminError::MissingFields)
        ));
        assert!(matches!(
            edit("Ion Popescu", "").validate(),
            Err(AdminError::MissingFields)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        assert!(matches!(
            edit("Ion Popescu", "ion.example.ro").validate(),
            Err(AdminError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_validate_trims_optional_fields() {
        let Ok(update) = edit("Ion Popescu", "Ion@Example.ro").validate() else {
            panic!("valid edit rejected");
        };
        assert_eq!(update.profile.phone.as_deref(), Some("0722 000 111"));
        assert_eq!(update.profile.address, None);
        assert_eq!(update.role, UserRole::Client);
        assert_eq!(update.status, AccountStatus::Active);
    }

    #[test]
    fn test_repository_errors_map_to_admin_errors() {
        assert!(matches!(
            AdminError::from(RepositoryError::NotFound),
            AdminError::UserNotFound
        ));
        assert!(matches!(
            AdminError::from(RepositoryError::Conflict("email already exists".into())),
            AdminError::EmailTaken
        ));
    }
}
