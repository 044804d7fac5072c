//! The OAuth 1.0a protocol state machine.
//!
//! Tokens move `UNAUTHORIZED → AUTHORIZED → CONSUMED`; every signed
//! operation validates, in order, consumer existence, timestamp window,
//! nonce freshness, signature-method support and finally the signature
//! itself, so cryptographic verification runs last. The server
//! holds no state of its own; every read and write goes through the
//! [`CredentialStore`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::request::OAuthRequest;
use super::signature::SignatureMethod;
use super::store::{ConsumeResult, CredentialStore};
use super::types::{Consumer, ConsumerStatus, OAuthError, Token, TokenKind, TokenState};

/// Default timestamp skew window, in seconds.
pub const DEFAULT_TIMESTAMP_WINDOW: i64 = 300;

/// Orchestrates the three-legged flow against a credential store and a set
/// of registered signature methods.
pub struct OAuthServer {
    store: Arc<dyn CredentialStore>,
    signature_methods: HashMap<&'static str, Arc<dyn SignatureMethod>>,
    timestamp_window: i64,
}

impl OAuthServer {
    /// Creates a server with no signature methods registered; callers add
    /// the ones they accept.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        OAuthServer {
            store,
            signature_methods: HashMap::new(),
            timestamp_window: DEFAULT_TIMESTAMP_WINDOW,
        }
    }

    /// Registers a signature method under its protocol name.
    pub fn add_signature_method(mut self, method: Arc<dyn SignatureMethod>) -> Self {
        self.signature_methods.insert(method.name(), method);
        self
    }

    /// Overrides the timestamp skew window.
    pub fn timestamp_window(mut self, seconds: i64) -> Self {
        self.timestamp_window = seconds;
        self
    }

    /// Issues a fresh UNAUTHORIZED request token for a valid, signed
    /// request-token call. The signature is computed with an empty token
    /// secret since no token exists yet.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn fetch_request_token(&self, request: &OAuthRequest) -> Result<Token, OAuthError> {
        request.validate_required_parameters(false)?;
        let consumer = self.verify_consumer(request).await?;
        self.check_timestamp(request)?;
        self.check_nonce(request, &consumer.key, "").await?;
        self.verify_signature(request, &consumer, "")?;
        let token = self
            .store
            .create_request_token(&consumer, request.callback())
            .await?;
        debug!(consumer = %consumer.key, token = %token.key, "request token issued");
        Ok(token)
    }

    /// Transitions a request token to AUTHORIZED, binding the granting user
    /// and minting a verifier.
    ///
    /// This is the one operation run in a browser context rather than a
    /// signed-API-call context; the caller must have authenticated the user
    /// through the surrounding session mechanism first. Calling it on a
    /// token no longer UNAUTHORIZED is a precondition failure with no
    /// effect.
    #[instrument(skip(self), level = "debug")]
    pub async fn authorize_token(&self, token_key: &str, user: &str) -> Result<Token, OAuthError> {
        let token = self.request_token(token_key).await?;
        match token.state {
            TokenState::Unauthorized => {}
            TokenState::Authorized => return Err(OAuthError::TokenNotAuthorized),
            TokenState::Consumed => return Err(OAuthError::TokenAlreadyConsumed),
        }
        let verifier = Uuid::new_v4().to_string();
        let token = self
            .store
            .authorize_request_token(token_key, user, &verifier)
            .await?;
        debug!(token = %token.key, "request token authorized");
        Ok(token)
    }

    /// Exchanges an AUTHORIZED request token for an access token, consuming
    /// the request token exactly once.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn fetch_access_token(&self, request: &OAuthRequest) -> Result<Token, OAuthError> {
        request.validate_required_parameters(true)?;
        let consumer = self.verify_consumer(request).await?;
        self.check_timestamp(request)?;
        let token = self.request_token(request.token_key()?).await?;
        if token.consumer_key != consumer.key {
            return Err(OAuthError::TokenNotFound);
        }
        match token.state {
            TokenState::Authorized => {}
            TokenState::Unauthorized => return Err(OAuthError::TokenNotAuthorized),
            TokenState::Consumed => return Err(OAuthError::TokenAlreadyConsumed),
        }
        if let Some(expected) = &token.verifier {
            if request.verifier() != Some(expected.as_str()) {
                return Err(OAuthError::TokenNotAuthorized);
            }
        }
        self.check_nonce(request, &consumer.key, &token.key).await?;
        self.verify_signature(request, &consumer, &token.secret)?;
        // The store's consume-and-issue is atomic; under a race the loser
        // observes the CONSUMED state here.
        match self.store.create_access_token(&token.key).await? {
            ConsumeResult::Issued(access) => {
                debug!(consumer = %consumer.key, token = %access.key, "access token issued");
                Ok(access)
            }
            ConsumeResult::StateConflict(TokenState::Consumed) => {
                Err(OAuthError::TokenAlreadyConsumed)
            }
            ConsumeResult::StateConflict(_) => Err(OAuthError::TokenNotAuthorized),
            ConsumeResult::Missing => Err(OAuthError::TokenNotFound),
        }
    }

    /// Authenticates a signed API call made with an access token, returning
    /// the (consumer, token) pair bound to the identity.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn verify_request(
        &self,
        request: &OAuthRequest,
    ) -> Result<(Consumer, Token), OAuthError> {
        request.validate_required_parameters(true)?;
        let consumer = self.verify_consumer(request).await?;
        self.check_timestamp(request)?;
        let token = self
            .store
            .lookup_token(TokenKind::Access, request.token_key()?)
            .await?
            .ok_or(OAuthError::TokenNotFound)?;
        if token.consumer_key != consumer.key {
            return Err(OAuthError::TokenNotFound);
        }
        self.check_nonce(request, &consumer.key, &token.key).await?;
        self.verify_signature(request, &consumer, &token.secret)?;
        Ok((consumer, token))
    }

    /// The callback URL supplied with the request, if any.
    pub fn get_callback(&self, request: &OAuthRequest) -> Option<String> {
        request.callback().map(str::to_string)
    }

    /// Looks up a request token by key, for the user-authorization step.
    pub async fn request_token(&self, key: &str) -> Result<Token, OAuthError> {
        self.store
            .lookup_token(TokenKind::Request, key)
            .await?
            .ok_or(OAuthError::TokenNotFound)
    }

    async fn verify_consumer(&self, request: &OAuthRequest) -> Result<Consumer, OAuthError> {
        let consumer = self
            .store
            .lookup_consumer(request.consumer_key()?)
            .await?
            .ok_or(OAuthError::InvalidConsumer)?;
        if consumer.status != ConsumerStatus::Active {
            return Err(OAuthError::InvalidConsumer);
        }
        Ok(consumer)
    }

    fn check_timestamp(&self, request: &OAuthRequest) -> Result<(), OAuthError> {
        let timestamp = request.timestamp()?;
        if (Utc::now().timestamp() - timestamp).abs() > self.timestamp_window {
            return Err(OAuthError::StaleTimestamp);
        }
        Ok(())
    }

    async fn check_nonce(
        &self,
        request: &OAuthRequest,
        consumer_key: &str,
        token_key: &str,
    ) -> Result<(), OAuthError> {
        let fresh = self
            .store
            .record_nonce_if_new(
                consumer_key,
                token_key,
                request.timestamp()?,
                request.nonce()?,
            )
            .await?;
        if !fresh {
            return Err(OAuthError::NonceReplay);
        }
        Ok(())
    }

    fn verify_signature(
        &self,
        request: &OAuthRequest,
        consumer: &Consumer,
        token_secret: &str,
    ) -> Result<(), OAuthError> {
        let name = request.signature_method()?;
        let method = self
            .signature_methods
            .get(name)
            .ok_or_else(|| OAuthError::UnsupportedSignatureMethod(name.to_string()))?;
        let valid = method.verify(
            &request.signature_base_string(),
            &consumer.secret,
            token_secret,
            request.signature()?,
        );
        if !valid {
            return Err(OAuthError::InvalidSignature);
        }
        Ok(())
    }
}
