//! Administrator management commands.

use gusturi_core::Email;
use gusturi_storefront::db::UserRepository;
use gusturi_storefront::services::auth::{hash_password, validate_new_password};

use crate::{CliError, connect};

/// Create an active administrator, or promote and re-key an existing account
/// with the same email.
pub async fn create(email: &str, name: &str, password: &str) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|e| CliError::Invalid(e.to_string()))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::Invalid("Name must not be empty".to_owned()));
    }

    validate_new_password(password, password).map_err(|e| CliError::Invalid(e.user_message()))?;
    let password_hash = hash_password(password).map_err(|e| CliError::Invalid(e.to_string()))?;

    let pool = connect().await?;
    let user = UserRepository::new(&pool)
        .upsert_admin(name, &email, &password_hash)
        .await
        .map_err(|e| CliError::Invalid(e.to_string()))?;

    tracing::info!(user_id = %user.id, email = %user.email, "Administrator ready");
    Ok(())
}
