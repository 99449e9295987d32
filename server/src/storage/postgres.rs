//! Postgres deployment store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::errors::StoreError;
use crate::models::{Deployment, Service, ServiceRecord, User};
use crate::storage::{DeploymentSelector, DeploymentStore};

pub struct PostgresStore {
    pool: PgPool,
}

/// Flat row of `services JOIN deployments`
#[derive(sqlx::FromRow)]
struct ServiceRow {
    service_id: i64,
    name: String,
    service_created_at: DateTime<Utc>,
    deployment_id: i64,
    user_id: i64,
    git_hash: String,
    deployment_created_at: DateTime<Utc>,
}

impl From<ServiceRow> for ServiceRecord {
    fn from(row: ServiceRow) -> Self {
        ServiceRecord {
            service: Service {
                id: row.service_id,
                deployment_id: row.deployment_id,
                name: row.name,
                created_at: row.service_created_at,
            },
            deployment: Deployment {
                id: row.deployment_id,
                user_id: row.user_id,
                git_hash: row.git_hash,
                created_at: row.deployment_created_at,
            },
        }
    }
}

const SERVICE_ROW_SELECT: &str = "SELECT s.id AS service_id, s.name, s.created_at AS service_created_at, \
     d.id AS deployment_id, d.user_id, d.git_hash, d.created_at AS deployment_created_at \
     FROM services s JOIN deployments d ON d.id = s.deployment_id";

impl PostgresStore {
    /// Connect and apply pending migrations
    pub async fn connect(url: &SecretString, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url.expose_secret())
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "connected to postgres, migrations applied");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentStore for PostgresStore {
    async fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, api_key, is_blocked, created_at FROM users WHERE api_key = $1",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn count_deployments(&self, user_id: i64) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deployments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn find_deployment(
        &self,
        user_id: i64,
        git_hash: &str,
    ) -> Result<Option<Deployment>, StoreError> {
        let deployment = sqlx::query_as::<_, Deployment>(
            "SELECT id, user_id, git_hash, created_at FROM deployments \
             WHERE user_id = $1 AND git_hash = $2",
        )
        .bind(user_id)
        .bind(git_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deployment)
    }

    async fn get_or_create_deployment(
        &self,
        user_id: i64,
        git_hash: &str,
    ) -> Result<Deployment, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let deployment = sqlx::query_as::<_, Deployment>(
            "INSERT INTO deployments (user_id, git_hash) VALUES ($1, $2) \
             ON CONFLICT (user_id, git_hash) DO UPDATE SET git_hash = EXCLUDED.git_hash \
             RETURNING id, user_id, git_hash, created_at",
        )
        .bind(user_id)
        .bind(git_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(deployment)
    }

    async fn upsert_service(&self, deployment_id: i64, name: &str) -> Result<Service, StoreError> {
        let service = sqlx::query_as::<_, Service>(
            "INSERT INTO services (deployment_id, name) VALUES ($1, $2) \
             ON CONFLICT (deployment_id, name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, deployment_id, name, created_at",
        )
        .bind(deployment_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(service)
    }

    async fn list_services(&self, user_id: i64) -> Result<Vec<ServiceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "{SERVICE_ROW_SELECT} WHERE d.user_id = $1 \
             ORDER BY d.created_at DESC, d.id DESC, s.name ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ServiceRecord::from).collect())
    }

    async fn find_service(
        &self,
        user_id: i64,
        name: &str,
        selector: &DeploymentSelector,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        let row = match selector {
            DeploymentSelector::Latest => {
                sqlx::query_as::<_, ServiceRow>(&format!(
                    "{SERVICE_ROW_SELECT} WHERE d.user_id = $1 AND s.name = $2 \
                     ORDER BY d.created_at DESC, d.id DESC LIMIT 1"
                ))
                .bind(user_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
            DeploymentSelector::GitHash(git_hash) => {
                sqlx::query_as::<_, ServiceRow>(&format!(
                    "{SERVICE_ROW_SELECT} WHERE d.user_id = $1 AND s.name = $2 AND d.git_hash = $3"
                ))
                .bind(user_id)
                .bind(name)
                .bind(git_hash)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row.map(ServiceRecord::from))
    }

    async fn delete_service(&self, service_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
