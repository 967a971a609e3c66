//! User queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use workorder_core::{Email, UserId, UserRole};

use super::work_orders::WorkOrderRow;
use super::{PgStore, RepositoryError, UserStore, classify};
use crate::models::{NewUser, User, UserCounts, UserWithCount, WorkOrder};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: UserRole,
    firebase_uid: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            role: row.role,
            firebase_uid: row.firebase_uid,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserCountRow {
    #[sqlx(flatten)]
    user: UserRow,
    work_order_count: i64,
}

impl TryFrom<UserCountRow> for UserWithCount {
    type Error = RepositoryError;

    fn try_from(row: UserCountRow) -> Result<Self, Self::Error> {
        let work_orders = u64::try_from(row.work_order_count).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative count {}", row.work_order_count))
        })?;

        Ok(Self {
            user: row.user.try_into()?,
            count: UserCounts { work_orders },
        })
    }
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl UserStore for PgStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, role, firebase_uid, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let uuids: Vec<Uuid> = ids.iter().map(UserId::as_uuid).collect();

        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, role, firebase_uid, created_at
            FROM users
            WHERE id = ANY($1)
            ",
        )
        .bind(&uuids)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_by_firebase_uid(&self, uid: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, role, firebase_uid, created_at
            FROM users
            WHERE firebase_uid = $1
            ",
        )
        .bind(uid)
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (name, email, role, firebase_uid)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, firebase_uid, created_at
            ",
        )
        .bind(&new.name)
        .bind(new.email.as_str())
        .bind(new.role)
        .bind(&new.firebase_uid)
        .fetch_one(self.pool())
        .await
        .map_err(classify)?;

        row.try_into()
    }

    async fn list_with_counts(&self) -> Result<Vec<UserWithCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserCountRow>(
            r"
            SELECT u.id, u.name, u.email, u.role, u.firebase_uid, u.created_at,
                   COUNT(w.id) AS work_order_count
            FROM users u
            LEFT JOIN work_orders w ON w.assigned_user_id = u.id
            GROUP BY u.id
            ORDER BY u.created_at DESC
            ",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn assigned_work_orders(&self, id: UserId) -> Result<Vec<WorkOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, WorkOrderRow>(
            r"
            SELECT id, title, description, status, assigned_user_id,
                   shopify_order_id, created_at, updated_at
            FROM work_orders
            WHERE assigned_user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
