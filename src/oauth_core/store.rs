//! Persistence traits consumed by the OAuth server.
//!
//! The store exclusively owns Consumer, Token and Nonce persistence; the
//! server never keeps state of its own. Nonce recording and request-token
//! consumption are the sole serialization points and must be check-and-set
//! atomic, since concurrent requests can race to replay a nonce or redeem
//! the same request token.

use async_trait::async_trait;

use super::types::{Consumer, StoreError, Token, TokenKind, TokenState};

/// Outcome of the atomic consume-and-issue step.
///
/// Losing a race is reported here rather than as a [`StoreError`] so the
/// server can map it onto the protocol taxonomy instead of a 500.
#[derive(Debug, Clone)]
pub enum ConsumeResult {
    /// The request token transitioned to CONSUMED and this access token was
    /// issued in its place.
    Issued(Token),
    /// The token existed but was not in the AUTHORIZED state; the observed
    /// state is returned.
    StateConflict(TokenState),
    /// No request token with that key exists.
    Missing,
}

/// Abstraction over persisted consumers, tokens and nonces.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Looks up a consumer by its public key.
    async fn lookup_consumer(&self, key: &str) -> Result<Option<Consumer>, StoreError>;

    /// Looks up a token by kind and key. A key of the wrong kind is a miss.
    async fn lookup_token(&self, kind: TokenKind, key: &str)
    -> Result<Option<Token>, StoreError>;

    /// Creates a fresh request token in the UNAUTHORIZED state.
    async fn create_request_token(
        &self,
        consumer: &Consumer,
        callback: Option<&str>,
    ) -> Result<Token, StoreError>;

    /// Transitions a request token to AUTHORIZED, binding the granting user
    /// and the verifier. State preconditions are the server's concern.
    async fn authorize_request_token(
        &self,
        key: &str,
        user: &str,
        verifier: &str,
    ) -> Result<Token, StoreError>;

    /// Atomically consumes an AUTHORIZED request token and issues exactly one
    /// access token in its place. Of two concurrent calls for the same key,
    /// one gets [`ConsumeResult::Issued`] and the other a state conflict.
    async fn create_access_token(&self, request_token_key: &str)
    -> Result<ConsumeResult, StoreError>;

    /// Records the (consumer key, token key, timestamp, nonce) tuple if it
    /// was never seen, returning `false` when it was already recorded, which
    /// the caller must treat as a replay. Tuples are retained for at least
    /// the replay window.
    async fn record_nonce_if_new(
        &self,
        consumer_key: &str,
        token_key: &str,
        timestamp: i64,
        nonce: &str,
    ) -> Result<bool, StoreError>;
}

/// Externally supplied username/password verification for Basic auth.
///
/// Returns the resolved identity on success, `None` on any failure; the
/// handler never distinguishes the two to callers.
#[async_trait]
pub trait CredentialCheck: Send + Sync + 'static {
    async fn check(&self, username: &str, password: &str) -> Option<String>;
}
