use async_trait::async_trait;
use damflow_core::{AppError, GroupMembership, GroupPermission};
use sqlx::{PgPool, Postgres};

/// Reads group standing from the `group_members` table.
#[derive(Clone)]
pub struct PgGroupMembership {
    pool: PgPool,
}

impl PgGroupMembership {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupMembership for PgGroupMembership {
    #[tracing::instrument(skip(self), fields(db.table = "group_members"))]
    async fn permission(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupPermission>, AppError> {
        let permission: Option<String> = sqlx::query_scalar::<Postgres, String>(
            "SELECT permission FROM group_members WHERE group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        permission
            .map(|p| {
                p.parse::<GroupPermission>()
                    .map_err(|e| AppError::Internal(format!("Invalid group permission: {}", e)))
            })
            .transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "group_members"))]
    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let groups = sqlx::query_scalar::<Postgres, i64>(
            "SELECT group_id FROM group_members WHERE user_id = $1 ORDER BY group_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }
}
