//! Identity store abstraction
//!
//! The authentication core only sees this trait. Implementations must
//! enforce uniqueness of `email` and `username` at write time and report a
//! violation as [`DbError::Duplicate`](crate::DbError::Duplicate); the
//! resolver relies on that to settle concurrent signups for the same email.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{Account, DbResult};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> DbResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>>;

    async fn exists_by_username(&self, username: &str) -> DbResult<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn exists_by_email(&self, email: &str) -> DbResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    /// Insert a new account, or update the mutable fields of an existing one.
    ///
    /// On update only `credential_hash`, `avatar_url`, `enabled` and `roles`
    /// are written; identity fields (`username`, `email`, `provider`,
    /// `provider_subject_id`) keep their stored values.
    async fn save(&self, account: &Account) -> DbResult<Account>;
}
