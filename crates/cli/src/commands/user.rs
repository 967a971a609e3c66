//! User management commands.
//!
//! Users normally appear on first login as workers. This is how the first
//! admin gets in, and how a worker is promoted ahead of their first login.

use workorder_api::db::{PgStore, RepositoryError, UserStore};
use workorder_api::models::NewUser;
use workorder_core::{Email, UserId, UserRole};

use super::{CommandError, connect};

/// Create a user linked to a Firebase uid.
pub async fn create(
    email: &str,
    name: &str,
    firebase_uid: &str,
    role: &str,
) -> Result<UserId, CommandError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| CommandError::Invalid(format!("role {role:?} (expected admin or worker)")))?;
    let email = Email::parse(email).map_err(|e| CommandError::Invalid(e.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::Invalid("name must not be empty".to_string()));
    }
    let firebase_uid = firebase_uid.trim();
    if firebase_uid.is_empty() {
        return Err(CommandError::Invalid("firebase uid must not be empty".to_string()));
    }

    let store = PgStore::new(connect().await?);
    let new = NewUser {
        name: name.to_string(),
        email: email.clone(),
        role,
        firebase_uid: firebase_uid.to_string(),
    };

    let user = store.create(&new).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => {
            CommandError::Invalid(format!("a user with email {email} or that uid already exists"))
        }
        other => other.into(),
    })?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}
