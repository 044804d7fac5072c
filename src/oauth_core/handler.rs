//! The request-pipeline-facing authentication contract.
//!
//! A handler answers "is this request authenticated, and if not, what
//! challenge to return". The set of schemes is closed and resolved at
//! configuration time; the pipeline treats Basic and OAuth interchangeably
//! through the trait object.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use tracing::debug;

use super::http::{HttpRequest, HttpResponse};
use super::request::{OAuthRequest, has_required_oauth_parameters};
use super::server::OAuthServer;
use super::store::CredentialCheck;

/// Polymorphic authentication contract.
#[async_trait]
pub trait AuthenticationHandler: Send + Sync + 'static {
    /// Whether the request carries valid credentials. On success the
    /// resolved identity is bound onto the request; failures never error.
    async fn is_authenticated(&self, request: &mut HttpRequest) -> bool;

    /// The response to return when `is_authenticated` said no.
    fn challenge(&self) -> HttpResponse;
}

/// Handler that requires no authentication at all.
pub struct NoAuth;

#[async_trait]
impl AuthenticationHandler for NoAuth {
    async fn is_authenticated(&self, _request: &mut HttpRequest) -> bool {
        true
    }

    /// Never reached in a correctly wired pipeline; calling it is a
    /// programming error and yields an empty 200.
    fn challenge(&self) -> HttpResponse {
        HttpResponse::status_text(200, "")
    }
}

/// HTTP Basic authentication against a pluggable credential check.
pub struct BasicAuth {
    check: Arc<dyn CredentialCheck>,
    realm: String,
}

impl BasicAuth {
    pub fn new(check: Arc<dyn CredentialCheck>) -> Self {
        BasicAuth {
            check,
            realm: "API".to_string(),
        }
    }

    /// Overrides the challenge realm.
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }
}

#[async_trait]
impl AuthenticationHandler for BasicAuth {
    async fn is_authenticated(&self, request: &mut HttpRequest) -> bool {
        let Some(header) = request.header("authorization") else {
            return false;
        };
        let Some((scheme, encoded)) = header.split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = BASE64_STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((username, password)) = credentials.split_once(':') else {
            return false;
        };
        match self.check.check(username, password).await {
            Some(identity) => {
                request.user = Some(identity);
                true
            }
            // Wrong password and unknown user look identical to callers.
            None => false,
        }
    }

    fn challenge(&self) -> HttpResponse {
        let mut response = HttpResponse::status_text(401, "Authorization Required");
        response.headers.push((
            "WWW-Authenticate".to_string(),
            format!("Basic realm=\"{}\"", self.realm),
        ));
        response
    }
}

/// OAuth 1.0a authentication via access-token verification.
pub struct OAuthAuth {
    server: Arc<OAuthServer>,
    realm: String,
}

impl OAuthAuth {
    pub fn new(server: Arc<OAuthServer>) -> Self {
        OAuthAuth {
            server,
            realm: "API".to_string(),
        }
    }

    /// Overrides the challenge realm.
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }
}

#[async_trait]
impl AuthenticationHandler for OAuthAuth {
    async fn is_authenticated(&self, request: &mut HttpRequest) -> bool {
        if !has_required_oauth_parameters(request) {
            return false;
        }
        let oauth_request = match OAuthRequest::from_http(request) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(error = %err, "oauth request rejected during parsing");
                return false;
            }
        };
        match self.server.verify_request(&oauth_request).await {
            Ok((consumer, token)) => {
                let Some(user) = token.user else {
                    debug!(token = %token.key, "access token carries no bound user");
                    return false;
                };
                request.user = Some(user);
                // Consumer identity keys any downstream throttling.
                request.throttle_key = Some(consumer.key);
                true
            }
            Err(err) => {
                debug!(error = %err, "oauth verification failed");
                false
            }
        }
    }

    fn challenge(&self) -> HttpResponse {
        let mut response = HttpResponse::html(format!(
            "<html><body><h1>Authorization Required</h1>\
             <p>This resource is protected with OAuth. Obtain a consumer key, \
             request a token, have the user authorize it, and sign your \
             requests with the resulting access token.</p>\
             <p>Realm: {}</p></body></html>",
            self.realm,
        ));
        response.status = 401;
        response.headers.push((
            "WWW-Authenticate".to_string(),
            format!("OAuth realm=\"{}\"", self.realm),
        ));
        response
    }
}
