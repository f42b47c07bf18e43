//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication and account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] gusturi_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated.
    #[error("account is inactive")]
    InactiveAccount,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password shorter than the minimum length.
    #[error("password must be at least {min} characters")]
    WeakPassword {
        /// Minimum length in characters.
        min: usize,
    },

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The current password given for a password change is wrong.
    #[error("current password is incorrect")]
    WrongCurrentPassword,

    /// A required form field is empty.
    #[error("required fields are missing")]
    MissingFields,

    /// Reset token unknown, expired or already used.
    #[error("invalid or expired reset token")]
    InvalidResetToken,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Message shown to the user in the form that caused the error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Adresa de email nu este validă.".to_string(),
            Self::InvalidCredentials => "Email sau parolă incorectă.".to_string(),
            Self::InactiveAccount => {
                "Acest cont este inactiv. Te rugăm să contactezi administratorul.".to_string()
            }
            Self::UserAlreadyExists => "Această adresă de email este deja înregistrată.".to_string(),
            Self::WeakPassword { min } => {
                format!("Parola trebuie să aibă cel puțin {min} caractere.")
            }
            Self::PasswordMismatch => "Parolele nu se potrivesc.".to_string(),
            Self::WrongCurrentPassword => "Parola curentă este incorectă.".to_string(),
            Self::MissingFields => "Toate câmpurile obligatorii trebuie completate.".to_string(),
            Self::InvalidResetToken => "Link-ul de resetare este invalid sau a expirat.".to_string(),
            Self::Repository(_) | Self::PasswordHash => {
                "A apărut o eroare. Te rugăm să încerci din nou mai târziu.".to_string()
            }
        }
    }

    /// Whether this is a server-side failure rather than bad user input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Repository(_) | Self::PasswordHash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_password_message_names_minimum() {
        assert_eq!(
            AuthError::WeakPassword { min: 6 }.user_message(),
            "Parola trebuie să aibă cel puțin 6 caractere."
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AuthError::Repository(RepositoryError::DataCorruption("bad row".into()));
        assert!(err.is_internal());
        assert!(!err.user_message().contains("bad row"));
        assert!(!AuthError::InvalidCredentials.is_internal());
    }
}
