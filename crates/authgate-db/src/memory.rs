//! In-process identity store
//!
//! Backs tests and `--dev-mode` servers. Both unique indexes are checked
//! and written under a single write guard, so concurrent inserts for the
//! same email behave like the PostgreSQL unique constraint: one wins, the
//! rest get `DbError::Duplicate`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Account, DbError, DbResult, IdentityStore, UniqueKey};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    by_email: HashMap<String, Uuid>,
    by_username: HashMap<String, Uuid>,
}

/// Identity store kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DbResult<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_username
            .get(username)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_email
            .get(&email_key(email))
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn exists_by_username(&self, username: &str) -> DbResult<bool> {
        Ok(self.tables.read().await.by_username.contains_key(username))
    }

    async fn exists_by_email(&self, email: &str) -> DbResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .by_email
            .contains_key(&email_key(email)))
    }

    async fn save(&self, account: &Account) -> DbResult<Account> {
        let mut tables = self.tables.write().await;

        if let Some(stored) = tables.accounts.get_mut(&account.id) {
            stored.credential_hash = account.credential_hash.clone();
            stored.avatar_url = account.avatar_url.clone();
            stored.enabled = account.enabled;
            stored.roles = account.roles.clone();
            stored.updated_at = Utc::now();
            return Ok(stored.clone());
        }

        let email = email_key(&account.email);
        if tables.by_email.contains_key(&email) {
            return Err(DbError::Duplicate {
                key: UniqueKey::Email,
                value: account.email.clone(),
            });
        }
        if tables.by_username.contains_key(&account.username) {
            return Err(DbError::Duplicate {
                key: UniqueKey::Username,
                value: account.username.clone(),
            });
        }

        tables.by_email.insert(email, account.id);
        tables.by_username.insert(account.username.clone(), account.id);
        tables.accounts.insert(account.id, account.clone());

        Ok(account.clone())
    }
}

/// Emails are unique regardless of case, as with `lower(email)` in PostgreSQL
fn email_key(email: &str) -> String {
    email.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthProvider;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryIdentityStore::new();
        let account = Account::local("alice", "alice@example.com", "hash");
        store.save(&account).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.find_by_id(account.id).await.unwrap(), Some(account.clone()));
        assert_eq!(store.find_by_username("alice").await.unwrap(), Some(account.clone()));
        assert_eq!(store.find_by_email("alice@example.com").await.unwrap(), Some(account));
        assert!(store.exists_by_email("alice@example.com").await.unwrap());
        assert!(!store.exists_by_username("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_email_and_username() {
        let store = MemoryIdentityStore::new();
        store
            .save(&Account::local("alice", "alice@example.com", "hash"))
            .await
            .unwrap();

        let same_email = Account::local("alice2", "alice@example.com", "hash");
        let err = store.save(&same_email).await.unwrap_err();
        assert!(err.is_duplicate(UniqueKey::Email));

        let same_username = Account::local("alice", "other@example.com", "hash");
        let err = store.save(&same_username).await.unwrap_err();
        assert!(err.is_duplicate(UniqueKey::Username));

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let store = MemoryIdentityStore::new();
        let account = Account::local("alice", "alice@example.com", "hash");
        store.save(&account).await.unwrap();

        assert_eq!(
            store.find_by_email("Alice@EXAMPLE.com").await.unwrap(),
            Some(account)
        );
        assert!(store.exists_by_email("ALICE@example.com").await.unwrap());

        let shouting = Account::local("alice2", "ALICE@EXAMPLE.COM", "hash");
        let err = store.save(&shouting).await.unwrap_err();
        assert!(err.is_duplicate(UniqueKey::Email));
    }

    #[tokio::test]
    async fn test_update_keeps_identity_fields() {
        let store = MemoryIdentityStore::new();
        let mut account = Account::new("a", "a@x.com", AuthProvider::new("github"));
        account.provider_subject_id = Some("123".to_string());
        store.save(&account).await.unwrap();

        let mut changed = account.clone();
        changed.avatar_url = Some("u2".to_string());
        changed.provider = AuthProvider::new("google");
        changed.username = "mallory".to_string();

        let saved = store.save(&changed).await.unwrap();
        assert_eq!(saved.avatar_url.as_deref(), Some("u2"));
        assert_eq!(saved.provider, AuthProvider::new("github"));
        assert_eq!(saved.username, "a");
        assert_eq!(store.len().await, 1);
    }
}
