use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{EventFilter, SigninStore, UserDirectory};
use crate::error::{SigninError, SigninResult};
use crate::models::{SigninEvent, SigninType, User};

/// Postgres-backed store over the `signin_ledger` schema.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to apply migrations")?;
        Ok(())
    }

    pub async fn upsert_user(&self, id: &str, username: &str) -> SigninResult<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO signin_ledger.users (id, username)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username
            RETURNING id, username
            "#,
        )
        .bind(id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
        })
    }

    /// Loads demo members and a spread of sign-ins over the past two weeks.
    pub async fn seed(&self) -> anyhow::Result<()> {
        let members = [
            ("301245987766112256", "avery"),
            ("301245987766112257", "jules"),
            ("301245987766112258", "kiara"),
        ];
        for (id, username) in members {
            self.upsert_user(id, username).await?;
        }

        let now = Utc::now();
        let signins = [
            (
                "6a0f3c52-0b7e-4d8c-9a43-2f1d5c7e8b01",
                "301245987766112256",
                SigninType::Meeting,
                Duration::days(7),
            ),
            (
                "6a0f3c52-0b7e-4d8c-9a43-2f1d5c7e8b02",
                "301245987766112256",
                SigninType::Meeting,
                Duration::days(1),
            ),
            (
                "6a0f3c52-0b7e-4d8c-9a43-2f1d5c7e8b03",
                "301245987766112257",
                SigninType::Meeting,
                Duration::days(1),
            ),
            (
                "6a0f3c52-0b7e-4d8c-9a43-2f1d5c7e8b04",
                "301245987766112257",
                SigninType::Workshop,
                Duration::days(3),
            ),
            (
                "6a0f3c52-0b7e-4d8c-9a43-2f1d5c7e8b05",
                "301245987766112258",
                SigninType::Event,
                Duration::days(12),
            ),
        ];

        for (id, user_id, signin_type, age) in signins {
            sqlx::query(
                r#"
                INSERT INTO signin_ledger.signins (id, user_id, signin_type, recorded_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(Uuid::parse_str(id)?)
            .bind(user_id)
            .bind(signin_type.as_str())
            .bind(now - age)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Upserts directory entries from a CSV with `id,username` columns.
    pub async fn import_users(&self, csv_path: &std::path::Path) -> anyhow::Result<usize> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            id: String,
            username: String,
        }

        let mut reader = csv::Reader::from_path(csv_path)
            .with_context(|| format!("failed to open {}", csv_path.display()))?;
        let mut imported = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            self.upsert_user(row.id.trim(), row.username.trim()).await?;
            imported += 1;
        }

        tracing::info!(imported, path = %csv_path.display(), "imported users");
        Ok(imported)
    }
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a EventFilter) {
    builder.push(" WHERE TRUE");
    if let Some(user_id) = &filter.user_id {
        builder.push(" AND s.user_id = ").push_bind(user_id.as_str());
    }
    if let Some(signin_type) = filter.signin_type {
        builder
            .push(" AND s.signin_type = ")
            .push_bind(signin_type.as_str());
    }
    if let Some(since) = filter.since {
        builder.push(" AND s.recorded_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND s.recorded_at <= ").push_bind(until);
    }
}

fn count_query(filter: &EventFilter) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM signin_ledger.signins s");
    push_filter(&mut builder, filter);
    builder
}

fn exists_query(filter: &EventFilter) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM signin_ledger.signins s");
    push_filter(&mut builder, filter);
    builder.push(")");
    builder
}

fn joined_query(filter: &EventFilter) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT s.id, s.user_id, s.signin_type, s.recorded_at, u.username \
         FROM signin_ledger.signins s \
         JOIN signin_ledger.users u ON u.id = s.user_id",
    );
    push_filter(&mut builder, filter);
    builder
}

/// Filter for a prior sign-in that keeps `event` inside its cooldown.
fn cooldown_filter(event: &SigninEvent, since: DateTime<Utc>) -> EventFilter {
    EventFilter::new()
        .user(&event.user_id)
        .kind(event.signin_type)
        .since(since)
}

const ADMISSION_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))";

fn signin_from_row(row: &PgRow) -> SigninResult<SigninEvent> {
    let signin_type: String = row.try_get("signin_type")?;
    Ok(SigninEvent {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        signin_type: signin_type.parse()?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

async fn insert_signin<'e, E>(executor: E, event: &SigninEvent) -> SigninResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO signin_ledger.signins (id, user_id, signin_type, recorded_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(event.id)
    .bind(&event.user_id)
    .bind(event.signin_type.as_str())
    .bind(event.recorded_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl SigninStore for PgStore {
    async fn insert(&self, event: &SigninEvent) -> SigninResult<()> {
        insert_signin(&self.pool, event).await
    }

    async fn insert_unless_since(
        &self,
        event: &SigninEvent,
        since: DateTime<Utc>,
    ) -> SigninResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent admissions for the same (user, type) until commit.
        sqlx::query(ADMISSION_LOCK_SQL)
            .bind(&event.user_id)
            .bind(event.signin_type.as_str())
            .execute(&mut *tx)
            .await?;

        let filter = cooldown_filter(event, since);
        let recent: bool = exists_query(&filter)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        if recent {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_signin(&mut *tx, event).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn count(&self, filter: &EventFilter) -> SigninResult<i64> {
        let count: i64 = count_query(filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn exists(&self, filter: &EventFilter) -> SigninResult<bool> {
        let exists: bool = exists_query(filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn query_with_users(
        &self,
        filter: &EventFilter,
    ) -> SigninResult<Vec<(SigninEvent, User)>> {
        let mut builder = joined_query(filter);
        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut signins = Vec::with_capacity(rows.len());

        for row in rows {
            let event = signin_from_row(&row)?;
            let user = User {
                id: event.user_id.clone(),
                username: row.try_get("username")?,
            };
            signins.push((event, user));
        }

        Ok(signins)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn get(&self, user_id: &str) -> SigninResult<User> {
        let row = sqlx::query("SELECT id, username FROM signin_ledger.users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SigninError::UserNotFound(user_id.to_string()))?;

        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
        })
    }
}
