use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use chrono::Utc;
use oauth1a_provider::{
    AuthenticationHandler, BasicAuth, Consumer, HttpRequest, InMemoryCredentialCheck,
    InMemoryCredentialStore, NoAuth, OAuthAuth, OAuthRequest, OAuthServer, Plaintext, Token,
};
use url::form_urlencoded;

fn basic_header(credentials: &str) -> String {
    format!("Basic {}", BASE64_STANDARD.encode(credentials.as_bytes()))
}

fn basic_handler() -> BasicAuth {
    BasicAuth::new(Arc::new(
        InMemoryCredentialCheck::new().with_user("alice", "s3cret"),
    ))
}

#[tokio::test]
async fn no_auth_always_passes() {
    let mut request = HttpRequest::new("GET", "https://api.example.com/anything");
    assert!(NoAuth.is_authenticated(&mut request).await);
    assert!(request.user.is_none());
}

#[tokio::test]
async fn basic_auth_binds_identity_on_success() {
    let handler = basic_handler();
    let mut request = HttpRequest::new("GET", "https://api.example.com/photos")
        .with_header("Authorization", basic_header("alice:s3cret"));
    assert!(handler.is_authenticated(&mut request).await);
    assert_eq!(request.user.as_deref(), Some("alice"));
}

#[tokio::test]
async fn basic_auth_failures_are_indistinguishable() {
    let handler = basic_handler();
    for header in [
        basic_header("alice:wrongpass"),
        basic_header("nobody:s3cret"),
        basic_header("no-colon-here"),
        "Basic not!base64".to_string(),
        "Bearer abcdef".to_string(),
    ] {
        let mut request = HttpRequest::new("GET", "https://api.example.com/photos")
            .with_header("Authorization", header.clone());
        assert!(
            !handler.is_authenticated(&mut request).await,
            "header {header:?} must not authenticate",
        );
        assert!(request.user.is_none());
    }
    let mut bare = HttpRequest::new("GET", "https://api.example.com/photos");
    assert!(!handler.is_authenticated(&mut bare).await);
}

#[tokio::test]
async fn basic_auth_challenge_carries_realm() {
    let challenge = basic_handler().challenge();
    assert_eq!(challenge.status, 401);
    assert_eq!(challenge.header("www-authenticate"), Some("Basic realm=\"API\""));

    let custom = basic_handler().realm("Photos").challenge();
    assert_eq!(custom.header("www-authenticate"), Some("Basic realm=\"Photos\""));
}

fn oauth_setup() -> (Arc<OAuthServer>, Arc<InMemoryCredentialStore>) {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.add_consumer(Consumer::new("ck1", "cs1", "Photo Printer"));
    let server = Arc::new(
        OAuthServer::new(store.clone()).add_signature_method(Arc::new(Plaintext)),
    );
    (server, store)
}

fn signed_api_request(token: &Token, nonce: &str) -> HttpRequest {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in [
        ("oauth_consumer_key", "ck1"),
        ("oauth_token", token.key.as_str()),
        ("oauth_signature_method", "PLAINTEXT"),
        ("oauth_signature", &format!("cs1&{}", token.secret)),
        ("oauth_timestamp", &Utc::now().timestamp().to_string()),
        ("oauth_nonce", nonce),
    ] {
        serializer.append_pair(k, v);
    }
    HttpRequest::new(
        "GET",
        format!("https://api.example.com/photos?{}", serializer.finish()),
    )
}

async fn issue_access_token(server: &OAuthServer) -> Token {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in [
        ("oauth_consumer_key", "ck1"),
        ("oauth_signature_method", "PLAINTEXT"),
        ("oauth_signature", "cs1&"),
        ("oauth_timestamp", &Utc::now().timestamp().to_string()),
        ("oauth_nonce", "n-issue"),
    ] {
        serializer.append_pair(k, v);
    }
    let request = OAuthRequest::from_http(&HttpRequest::new(
        "POST",
        format!(
            "https://api.example.com/oauth/request_token?{}",
            serializer.finish()
        ),
    ))
    .unwrap();
    let request_token = server.fetch_request_token(&request).await.unwrap();
    let authorized = server
        .authorize_token(&request_token.key, "alice")
        .await
        .unwrap();
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in [
        ("oauth_consumer_key", "ck1"),
        ("oauth_token", authorized.key.as_str()),
        ("oauth_signature_method", "PLAINTEXT"),
        ("oauth_signature", &format!("cs1&{}", authorized.secret)),
        ("oauth_timestamp", &Utc::now().timestamp().to_string()),
        ("oauth_nonce", "n-access"),
        ("oauth_verifier", authorized.verifier.as_deref().unwrap()),
    ] {
        serializer.append_pair(k, v);
    }
    let exchange = OAuthRequest::from_http(&HttpRequest::new(
        "POST",
        format!(
            "https://api.example.com/oauth/access_token?{}",
            serializer.finish()
        ),
    ))
    .unwrap();
    server.fetch_access_token(&exchange).await.unwrap()
}

#[tokio::test]
async fn oauth_auth_binds_user_and_throttle_key() {
    let (server, _) = oauth_setup();
    let access = issue_access_token(&server).await;
    let handler = OAuthAuth::new(server);

    let mut request = signed_api_request(&access, "n-api");
    assert!(handler.is_authenticated(&mut request).await);
    assert_eq!(request.user.as_deref(), Some("alice"));
    assert_eq!(request.throttle_key.as_deref(), Some("ck1"));
}

#[tokio::test]
async fn oauth_auth_rejects_structurally_incomplete_requests() {
    let (server, _) = oauth_setup();
    let handler = OAuthAuth::new(server);
    // No OAuth parameters at all.
    let mut bare = HttpRequest::new("GET", "https://api.example.com/photos");
    assert!(!handler.is_authenticated(&mut bare).await);
    // Parameters split across sources: the pre-check refuses to merge them.
    let mut split = HttpRequest::new(
        "GET",
        "https://api.example.com/photos?oauth_timestamp=1&oauth_nonce=n&oauth_signature=s",
    )
    .with_header(
        "Authorization",
        "OAuth oauth_consumer_key=\"ck1\", oauth_token=\"tk\", oauth_signature_method=\"PLAINTEXT\"",
    );
    assert!(!handler.is_authenticated(&mut split).await);
}

#[tokio::test]
async fn oauth_auth_swallows_protocol_errors() {
    let (server, _) = oauth_setup();
    let access = issue_access_token(&server).await;
    let handler = OAuthAuth::new(server);

    // Valid structure, wrong signature: not authenticated, no panic, no bind.
    let mut request = signed_api_request(&access, "n-bad");
    let forged = request.url.replace(&format!("cs1%26{}", access.secret), "forged");
    request.url = forged;
    assert!(!handler.is_authenticated(&mut request).await);
    assert!(request.user.is_none());
    assert!(request.throttle_key.is_none());
}

#[tokio::test]
async fn throttle_key_feeds_the_rate_limit_hook() {
    use dashmap::DashMap;
    use oauth1a_provider::{RateLimiter, StoreError};

    struct CountingLimiter {
        hits: DashMap<String, u32>,
        cap: u32,
    }

    #[async_trait::async_trait]
    impl RateLimiter for CountingLimiter {
        async fn consume(&self, key: &str) -> Result<bool, StoreError> {
            let mut hits = self.hits.entry(key.to_string()).or_insert(0);
            *hits += 1;
            Ok(*hits <= self.cap)
        }
    }

    let (server, _) = oauth_setup();
    let access = issue_access_token(&server).await;
    let handler = OAuthAuth::new(server);
    let limiter = CountingLimiter { hits: DashMap::new(), cap: 1 };

    let mut first = signed_api_request(&access, "n-rl1");
    assert!(handler.is_authenticated(&mut first).await);
    assert!(limiter.consume(first.throttle_key.as_deref().unwrap()).await.unwrap());

    let mut second = signed_api_request(&access, "n-rl2");
    assert!(handler.is_authenticated(&mut second).await);
    // Same consumer key both times: the second request is throttled.
    assert!(!limiter.consume(second.throttle_key.as_deref().unwrap()).await.unwrap());
}

#[tokio::test]
async fn oauth_challenge_has_header_and_body() {
    let (server, _) = oauth_setup();
    let challenge = OAuthAuth::new(server).challenge();
    assert_eq!(challenge.status, 401);
    assert_eq!(challenge.header("www-authenticate"), Some("OAuth realm=\"API\""));
    assert!(challenge.body_string().contains("OAuth"));
}
