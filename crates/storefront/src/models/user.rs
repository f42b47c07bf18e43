//! User domain types.

use chrono::{DateTime, Utc};

use gusturi_core::{AccountStatus, Email, UserId, UserRole};

/// A registered account (client or administrator).
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub postal_code: Option<String>,
    pub role: UserRole,
    pub status: AccountStatus,
    pub registered_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Data for a new client account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub postal_code: Option<String>,
}

/// Fields a user can change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub postal_code: Option<String>,
}

/// Fields an administrator can change on any account.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub profile: ProfileUpdate,
    pub email: Email,
    pub role: UserRole,
    pub status: AccountStatus,
}

/// Loyalty points balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoyaltyBalance {
    pub total: i32,
    pub used: i32,
}

impl LoyaltyBalance {
    /// Points still available, never negative.
    #[must_use]
    pub const fn available(&self) -> i32 {
        let available = self.total - self.used;
        if available > 0 { available } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_points() {
        assert_eq!(LoyaltyBalance { total: 120, used: 20 }.available(), 100);
    }

    #[test]
    fn test_available_points_floor_at_zero() {
        assert_eq!(LoyaltyBalance { total: 10, used: 25 }.available(), 0);
        assert_eq!(LoyaltyBalance::default().available(), 0);
    }
}
