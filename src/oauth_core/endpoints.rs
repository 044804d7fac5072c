//! The three protocol entry points: request-token issuance, user
//! authorization and access-token exchange.
//!
//! Thin orchestration over [`OAuthServer`] and [`OAuthRequest`]: every
//! protocol error is caught here and mapped to its 401 (or 500 for store
//! faults); nothing from the taxonomy escapes to the transport layer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::http::{HttpRequest, HttpResponse};
use super::request::OAuthRequest;
use super::server::OAuthServer;
use super::types::{Token, oauth_encode};

/// Session key under which the pending request-token key is stashed between
/// the consent GET and the grant POST.
const PENDING_TOKEN_KEY: &str = "oauth_pending_token";

/// Framework-provided session for the human-authorization step. The caller
/// guarantees the user behind it is logged in before invoking the
/// authorization endpoint.
#[async_trait]
pub trait Session: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn remove(&self, key: &str);
}

/// Renders the consent page shown to the user mid-flow. Template machinery
/// is out of scope; implementations bridge to whatever the host application
/// renders with.
#[async_trait]
pub trait ConsentRenderer: Send + Sync + 'static {
    async fn render(
        &self,
        token: &Token,
        callback: Option<&str>,
        parameters: &str,
    ) -> HttpResponse;
}

/// Minimal consent page used when the host supplies no renderer.
pub struct PlainConsentRenderer;

#[async_trait]
impl ConsentRenderer for PlainConsentRenderer {
    async fn render(
        &self,
        token: &Token,
        _callback: Option<&str>,
        parameters: &str,
    ) -> HttpResponse {
        HttpResponse::html(format!(
            "<html><body><h1>Authorize application</h1>\
             <form method=\"POST\">\
             <input type=\"hidden\" name=\"oauth_token\" value=\"{}\"/>\
             <p>Request parameters: {}</p>\
             <button type=\"submit\" name=\"authorize_access\" value=\"1\">Grant</button>\
             <button type=\"submit\" name=\"authorize_access\" value=\"0\">Deny</button>\
             </form></body></html>",
            token.key, parameters,
        ))
    }
}

/// The protocol endpoints, configured once and shared across requests.
pub struct OAuthEndpoints {
    server: Arc<OAuthServer>,
    renderer: Arc<dyn ConsentRenderer>,
    default_callback: Option<String>,
    realm: String,
}

impl OAuthEndpoints {
    pub fn new(server: Arc<OAuthServer>) -> Self {
        OAuthEndpoints {
            server,
            renderer: Arc::new(PlainConsentRenderer),
            default_callback: None,
            realm: "API".to_string(),
        }
    }

    /// Sets a custom consent renderer.
    pub fn renderer(mut self, renderer: Arc<dyn ConsentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Callback URL used when neither the token nor the request carries one.
    pub fn default_callback(mut self, url: impl Into<String>) -> Self {
        self.default_callback = Some(url.into());
        self
    }

    /// Overrides the challenge realm on error responses.
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// POST /oauth/request_token: issues a request token.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn request_token(&self, request: &HttpRequest) -> HttpResponse {
        let outcome = match OAuthRequest::from_http(request) {
            Ok(parsed) => self.server.fetch_request_token(&parsed).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(token) => HttpResponse::ok_urlencoded(token.to_urlencoded(false)),
            Err(err) => err.into_response(&self.realm),
        }
    }

    /// GET/POST /oauth/authorize: the human consent step.
    ///
    /// `user` is the identity the framework's login check resolved; this
    /// endpoint never runs for anonymous requests. GET renders the consent
    /// page and stashes the token key in the session; POST requires the
    /// session echo to match, then authorizes or denies and redirects to the
    /// callback.
    #[instrument(skip(self, request, session), level = "debug")]
    pub async fn user_authorization(
        &self,
        request: &HttpRequest,
        session: &dyn Session,
        user: &str,
    ) -> HttpResponse {
        let oauth_request = match OAuthRequest::from_http(request) {
            Ok(parsed) => parsed,
            Err(err) => return err.into_response(&self.realm),
        };
        let token_key = match oauth_request.require("oauth_token") {
            Ok(key) => key.to_string(),
            Err(err) => return err.into_response(&self.realm),
        };
        let token = match self.server.request_token(&token_key).await {
            Ok(token) => token,
            Err(err) => return err.into_response(&self.realm),
        };
        let callback = token
            .callback
            .clone()
            .or_else(|| self.server.get_callback(&oauth_request))
            .or_else(|| self.default_callback.clone());

        if request.method.eq_ignore_ascii_case("GET") {
            session.set(PENDING_TOKEN_KEY, &token.key).await;
            return self
                .renderer
                .render(&token, callback.as_deref(), &oauth_request.normalized_parameters())
                .await;
        }
        if !request.method.eq_ignore_ascii_case("POST") {
            return HttpResponse::status_text(405, "Method not allowed.");
        }

        // The POST must echo the token the consent page was rendered for.
        if session.get(PENDING_TOKEN_KEY).await.as_deref() != Some(token.key.as_str()) {
            return HttpResponse::status_text(403, "Action not allowed.");
        }
        session.remove(PENDING_TOKEN_KEY).await;

        let granted = oauth_request
            .parameter("authorize_access")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        let args = if granted {
            let token = match self.server.authorize_token(&token.key, user).await {
                Ok(token) => token,
                Err(err) => return err.into_response(&self.realm),
            };
            let mut args = format!("?{}", token.to_urlencoded(true));
            if let Some(verifier) = &token.verifier {
                args.push_str(&format!("&oauth_verifier={}", oauth_encode(verifier)));
            }
            args
        } else {
            format!("?error={}", oauth_encode("Access not granted by user."))
        };

        match callback {
            Some(callback) => HttpResponse::redirect(format!("{callback}{args}")),
            // Out-of-band flow: show the outcome directly.
            None => HttpResponse::status_text(200, args.trim_start_matches('?').to_string()),
        }
    }

    /// POST /oauth/access_token: exchanges an authorized request token.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn access_token(&self, request: &HttpRequest) -> HttpResponse {
        let outcome = match OAuthRequest::from_http(request) {
            Ok(parsed) => self.server.fetch_access_token(&parsed).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(token) => HttpResponse::ok_urlencoded(token.to_urlencoded(false)),
            Err(err) => err.into_response(&self.realm),
        }
    }
}
