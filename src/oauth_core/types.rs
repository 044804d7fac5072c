//! OAuth 1.0a core primitives: Consumer, Token, Nonce and errors.

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use thiserror::Error;
use tracing::warn;

use super::http::HttpResponse;

/// Unreserved characters per RFC 3986: A-Z a-z 0-9 - . _ ~
pub(crate) const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a string with the OAuth unreserved set.
pub fn oauth_encode(input: &str) -> String {
    percent_encode(input.as_bytes(), OAUTH_ENCODE_SET).to_string()
}

/// Registration status of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConsumerStatus {
    /// Consumer may sign requests.
    Active,
    /// Consumer is blocked; all of its requests are rejected.
    Suspended,
}

/// A registered client application identified by a key/secret pair.
///
/// Consumers are provisioned by an administrative process and are read-only
/// to this crate; the key is globally unique and immutable after creation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Consumer {
    /// Public identifier.
    pub key: String,
    /// Shared signing secret.
    pub secret: String,
    /// Human-readable application name.
    pub name: String,
    /// Registration status.
    pub status: ConsumerStatus,
}

impl Consumer {
    /// Creates an active consumer.
    pub fn new(key: impl Into<String>, secret: impl Into<String>, name: impl Into<String>) -> Self {
        Consumer {
            key: key.into(),
            secret: secret.into(),
            name: name.into(),
            status: ConsumerStatus::Active,
        }
    }
}

/// Whether a token is a request token or an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TokenKind {
    Request,
    Access,
}

/// Authorization state of a request token.
///
/// `Consumed` is terminal: a consumed request token's key and secret are no
/// longer valid for anything. Access tokens stay in `Authorized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TokenState {
    Unauthorized,
    Authorized,
    Consumed,
}

/// A request or access token owned by a consumer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Token {
    /// Public token identifier.
    pub key: String,
    /// Token signing secret.
    pub secret: String,
    /// Key of the owning consumer.
    pub consumer_key: String,
    pub kind: TokenKind,
    pub state: TokenState,
    /// Identity of the granting user, set once authorized.
    pub user: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Callback URL supplied at issuance, if any.
    pub callback: Option<String>,
    /// Verifier value minted at authorization time.
    pub verifier: Option<String>,
}

impl Token {
    /// Wire representation used by the protocol endpoints:
    /// `oauth_token=...&oauth_token_secret=...` (urlencoded, never JSON).
    ///
    /// With `only_key` the secret is omitted, as when a token key is echoed
    /// back through a callback redirect.
    pub fn to_urlencoded(&self, only_key: bool) -> String {
        let mut out = format!("oauth_token={}", oauth_encode(&self.key));
        if !only_key {
            out.push_str(&format!("&oauth_token_secret={}", oauth_encode(&self.secret)));
        }
        out
    }
}

/// Opaque fault raised by a credential-store backend.
///
/// Deliberately outside the protocol taxonomy: a store fault is a bug or an
/// outage, not a protocol violation, and surfaces as a 500.
#[derive(Debug, Error)]
#[error("credential store failure: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError(message.into())
    }
}

/// Protocol-level OAuth error kinds.
///
/// All variants except `Store` are recoverable by the caller and map to a
/// 401 response with a stable machine-readable problem code.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// The OAuth parameters could not be parsed or a required one is absent.
    #[error("Invalid request parameters.")]
    MalformedRequest,
    /// Unknown, suspended or mismatched consumer key.
    #[error("Invalid consumer.")]
    InvalidConsumer,
    /// The `oauth_signature_method` names no registered method.
    #[error("Signature method {0} is not supported.")]
    UnsupportedSignatureMethod(String),
    /// Signature verification failed.
    #[error("Invalid signature.")]
    InvalidSignature,
    /// Timestamp outside the configured skew window.
    #[error("Timestamp outside the acceptable window.")]
    StaleTimestamp,
    /// The (consumer, token, timestamp, nonce) tuple was already seen.
    #[error("Nonce already used.")]
    NonceReplay,
    /// No token with the given key and kind exists.
    #[error("Token not found.")]
    TokenNotFound,
    /// The request token is not in the AUTHORIZED state.
    #[error("Token not authorized.")]
    TokenNotAuthorized,
    /// The request token was already exchanged for an access token.
    #[error("Token already consumed.")]
    TokenAlreadyConsumed,
    /// Backend fault, surfaced as a 500.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OAuthError {
    /// Stable problem code carried in error bodies.
    pub fn problem_code(&self) -> &'static str {
        match self {
            OAuthError::MalformedRequest => "invalid_request",
            OAuthError::InvalidConsumer => "consumer_key_rejected",
            OAuthError::UnsupportedSignatureMethod(_) => "signature_method_rejected",
            OAuthError::InvalidSignature => "signature_invalid",
            OAuthError::StaleTimestamp => "timestamp_refused",
            OAuthError::NonceReplay => "nonce_used",
            OAuthError::TokenNotFound => "token_rejected",
            OAuthError::TokenNotAuthorized => "token_not_authorized",
            OAuthError::TokenAlreadyConsumed => "token_consumed",
            OAuthError::Store(_) => "server_error",
        }
    }

    /// Convert this error into the HTTP response the protocol endpoints
    /// return: 401 with a `WWW-Authenticate: OAuth realm="..."` header and an
    /// urlencoded problem body, or 500 for store faults.
    pub fn into_response(&self, realm: &str) -> HttpResponse {
        let code = self.problem_code();
        warn!(error = ?self, problem = code, "oauth request rejected");
        if let OAuthError::Store(_) = self {
            return HttpResponse::status_text(500, "Internal server error.");
        }
        let body = format!(
            "oauth_problem={}&oauth_problem_advice={}",
            code,
            oauth_encode(&self.to_string()),
        );
        HttpResponse::unauthorized_urlencoded(&format!("OAuth realm=\"{realm}\""), body)
    }
}
