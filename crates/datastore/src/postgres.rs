use crate::traits::UserStore;
use anyhow::Result;
use sqlx::{PgPool, Row};
use tracing::info;
use usersync_core::{Role, UserId, UserRecord};

/// PostgreSQL implementation of the `UserStore` trait.
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!(message = "running migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!(message = "migrations complete");
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, first_name, last_name, phone_number, role,
                   is_active, has_onboarded, examiner_profile_id,
                   created_at, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        Ok(Some(UserRecord {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            phone_number: row.try_get("phone_number")?,
            role: Role::parse(&role),
            is_active: row.try_get("is_active")?,
            has_onboarded: row.try_get("has_onboarded")?,
            examiner_profile_id: row.try_get("examiner_profile_id")?,
            created_at: row.try_get("created_at")?,
            last_login: row.try_get("last_login")?,
        }))
    }

    async fn set_onboarded(&self, id: UserId, onboarded: bool) -> Result<()> {
        sqlx::query("UPDATE users SET has_onboarded = $2 WHERE id = $1")
            .bind(id)
            .bind(onboarded)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_examiner_profile(&self, id: UserId, profile_ref: &str) -> Result<()> {
        sqlx::query("UPDATE users SET examiner_profile_id = $2 WHERE id = $1")
            .bind(id)
            .bind(profile_ref)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_exam_session(&self, user_id: UserId, session_key: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO exam_sessions (user_id, session_key, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (session_key) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(session_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        // A cheap round trip forces the pool to validate (and replace)
        // connections that idled out between poll cycles.
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
