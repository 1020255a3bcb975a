//! PostgreSQL implementation of AuthProvider.
//!
//! Loads the account record for a validated token so admission can check
//! that the account is still active.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{AccountStatus, AuthError, UserAccount, UserId};
use crate::ports::AuthProvider;

/// PostgreSQL implementation of the AuthProvider port.
pub struct PostgresAuthProvider {
    pool: PgPool,
}

impl PostgresAuthProvider {
    /// Creates a new PostgresAuthProvider with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row for account lookups.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    status: String,
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        let account = UserAccount::new(
            UserId::from_uuid(row.id),
            row.email,
            AccountStatus::parse(&row.status),
        );
        match row.name {
            Some(name) if !name.is_empty() => account.with_display_name(name),
            _ => account,
        }
    }
}

#[async_trait]
impl AuthProvider for PostgresAuthProvider {
    async fn get_user(&self, user_id: &UserId) -> Result<UserAccount, AuthError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, name, status
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "User lookup failed");
            AuthError::service_unavailable(format!("Failed to load user: {}", e))
        })?;

        row.map(UserAccount::from).ok_or(AuthError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, name: Option<&str>) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "grace@example.com".to_string(),
            name: name.map(str::to_string),
            status: status.to_string(),
        }
    }

    #[test]
    fn active_row_maps_to_active_account() {
        let account = UserAccount::from(row("active", Some("Grace")));

        assert!(account.status.is_active());
        assert_eq!(account.display_name.as_deref(), Some("Grace"));
    }

    #[test]
    fn suspended_row_maps_to_inactive_account() {
        let account = UserAccount::from(row("suspended", None));

        assert_eq!(account.status, AccountStatus::Inactive);
    }

    #[test]
    fn empty_name_is_treated_as_missing() {
        let account = UserAccount::from(row("active", Some("")));

        assert_eq!(account.display_name, None);
        assert_eq!(account.email, "grace@example.com");
    }
}
