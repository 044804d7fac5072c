//! In-memory default implementations for the persistence traits.
//!
//! Suitable as a reference implementation and for tests; each map shard lock
//! provides the per-key check-and-set guarantees the store contract asks for.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use super::endpoints::Session;
use super::store::{ConsumeResult, CredentialCheck, CredentialStore};
use super::types::{Consumer, StoreError, Token, TokenKind, TokenState, oauth_encode};

#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    consumers: Arc<DashMap<String, Consumer>>,
    tokens: Arc<DashMap<String, Token>>,
    nonces: Arc<DashSet<String>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with an initial set of consumers.
    pub fn with_consumers(initial: Vec<Consumer>) -> Self {
        let store = Self::new();
        for consumer in initial {
            store.add_consumer(consumer);
        }
        store
    }

    /// Registers a consumer. Consumer provisioning itself is out of scope;
    /// this stands in for the administrative process.
    pub fn add_consumer(&self, consumer: Consumer) {
        self.consumers.insert(consumer.key.clone(), consumer);
    }

    fn fresh_token(consumer_key: &str, kind: TokenKind, callback: Option<&str>) -> Token {
        Token {
            key: Uuid::new_v4().to_string(),
            secret: Uuid::new_v4().to_string(),
            consumer_key: consumer_key.to_string(),
            kind,
            state: TokenState::Unauthorized,
            user: None,
            created_at: Utc::now(),
            callback: callback.map(str::to_string),
            verifier: None,
        }
    }

    // Encoded parts contain no '&', so the joined key is unambiguous.
    fn nonce_key(consumer_key: &str, token_key: &str, timestamp: i64, nonce: &str) -> String {
        format!(
            "{}&{}&{}&{}",
            oauth_encode(consumer_key),
            oauth_encode(token_key),
            timestamp,
            oauth_encode(nonce),
        )
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup_consumer(&self, key: &str) -> Result<Option<Consumer>, StoreError> {
        Ok(self.consumers.get(key).map(|entry| entry.value().clone()))
    }

    async fn lookup_token(
        &self,
        kind: TokenKind,
        key: &str,
    ) -> Result<Option<Token>, StoreError> {
        Ok(self
            .tokens
            .get(key)
            .filter(|entry| entry.value().kind == kind)
            .map(|entry| entry.value().clone()))
    }

    async fn create_request_token(
        &self,
        consumer: &Consumer,
        callback: Option<&str>,
    ) -> Result<Token, StoreError> {
        let token = Self::fresh_token(&consumer.key, TokenKind::Request, callback);
        self.tokens.insert(token.key.clone(), token.clone());
        Ok(token)
    }

    async fn authorize_request_token(
        &self,
        key: &str,
        user: &str,
        verifier: &str,
    ) -> Result<Token, StoreError> {
        let mut entry = self
            .tokens
            .get_mut(key)
            .ok_or_else(|| StoreError::new(format!("request token {key} disappeared")))?;
        let token = entry.value_mut();
        token.state = TokenState::Authorized;
        token.user = Some(user.to_string());
        token.verifier = Some(verifier.to_string());
        Ok(token.clone())
    }

    async fn create_access_token(
        &self,
        request_token_key: &str,
    ) -> Result<ConsumeResult, StoreError> {
        // The transition happens under the entry guard; the guard is dropped
        // before the new token is inserted to keep the map lock single-entry.
        let issued_from = {
            let Some(mut entry) = self.tokens.get_mut(request_token_key) else {
                return Ok(ConsumeResult::Missing);
            };
            let token = entry.value_mut();
            if token.kind != TokenKind::Request {
                return Ok(ConsumeResult::Missing);
            }
            if token.state != TokenState::Authorized {
                return Ok(ConsumeResult::StateConflict(token.state));
            }
            token.state = TokenState::Consumed;
            (token.consumer_key.clone(), token.user.clone())
        };
        let mut access = Self::fresh_token(&issued_from.0, TokenKind::Access, None);
        access.state = TokenState::Authorized;
        access.user = issued_from.1;
        self.tokens.insert(access.key.clone(), access.clone());
        Ok(ConsumeResult::Issued(access))
    }

    async fn record_nonce_if_new(
        &self,
        consumer_key: &str,
        token_key: &str,
        timestamp: i64,
        nonce: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .nonces
            .insert(Self::nonce_key(consumer_key, token_key, timestamp, nonce)))
    }
}

/// In-memory session backing for the user-authorization step.
#[derive(Clone, Default)]
pub struct InMemorySession {
    values: Arc<DashMap<String, String>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    async fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    async fn remove(&self, key: &str) {
        self.values.remove(key);
    }
}

/// Username/password table for Basic auth in tests and demos. The resolved
/// identity is the username itself.
#[derive(Clone, Default)]
pub struct InMemoryCredentialCheck {
    users: Arc<DashMap<String, String>>,
}

impl InMemoryCredentialCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }
}

#[async_trait]
impl CredentialCheck for InMemoryCredentialCheck {
    async fn check(&self, username: &str, password: &str) -> Option<String> {
        self.users
            .get(username)
            .filter(|entry| entry.value() == password)
            .map(|_| username.to_string())
    }
}
