//! Account repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{Account, AuthProvider, DbError, DbResult, IdentityStore, UniqueKey};

const EMAIL_CONSTRAINT: &str = "accounts_email_key";
const USERNAME_CONSTRAINT: &str = "accounts_username_key";

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    email: String,
    credential_hash: Option<String>,
    provider: String,
    provider_subject_id: Option<String>,
    avatar_url: Option<String>,
    enabled: bool,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            credential_hash: row.credential_hash,
            provider: AuthProvider::new(row.provider),
            provider_subject_id: row.provider_subject_id,
            avatar_url: row.avatar_url,
            enabled: row.enabled,
            roles: row.roles.into_iter().collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed identity store
#[derive(Clone)]
pub struct AccountRepo {
    pool: PgPool,
}

impl AccountRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for AccountRepo {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                id, username, email, credential_hash, provider, provider_subject_id,
                avatar_url, enabled, roles, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Account::from))
    }

    async fn find_by_username(&self, username: &str) -> DbResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                id, username, email, credential_hash, provider, provider_subject_id,
                avatar_url, enabled, roles, created_at, updated_at
            FROM accounts
            WHERE username = $1
            "#
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Account::from))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                id, username, email, credential_hash, provider, provider_subject_id,
                avatar_url, enabled, roles, created_at, updated_at
            FROM accounts
            WHERE lower(email) = lower($1)
            "#
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Account::from))
    }

    async fn exists_by_username(&self, username: &str) -> DbResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn exists_by_email(&self, email: &str) -> DbResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE lower(email) = lower($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save(&self, account: &Account) -> DbResult<Account> {
        // Identity columns never change once written
        let roles: Vec<String> = account.roles.iter().cloned().collect();

        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (
                id, username, email, credential_hash, provider, provider_subject_id,
                avatar_url, enabled, roles, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                credential_hash = EXCLUDED.credential_hash,
                avatar_url = EXCLUDED.avatar_url,
                enabled = EXCLUDED.enabled,
                roles = EXCLUDED.roles,
                updated_at = NOW()
            RETURNING
                id, username, email, credential_hash, provider, provider_subject_id,
                avatar_url, enabled, roles, created_at, updated_at
            "#
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.credential_hash)
        .bind(account.provider.as_str())
        .bind(&account.provider_subject_id)
        .bind(&account.avatar_url)
        .bind(account.enabled)
        .bind(roles)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, account))?;

        Ok(row.into())
    }
}

/// Translate unique-index violations into `DbError::Duplicate`
fn unique_violation(err: sqlx::Error, account: &Account) -> DbError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some(EMAIL_CONSTRAINT) => {
                return DbError::Duplicate {
                    key: UniqueKey::Email,
                    value: account.email.clone(),
                };
            }
            Some(USERNAME_CONSTRAINT) => {
                return DbError::Duplicate {
                    key: UniqueKey::Username,
                    value: account.username.clone(),
                };
            }
            _ => {}
        }
    }
    DbError::Query(err)
}
