pub mod oauth_core;

pub use oauth_core::endpoints::{ConsentRenderer, OAuthEndpoints, PlainConsentRenderer, Session};
pub use oauth_core::handler::{AuthenticationHandler, BasicAuth, NoAuth, OAuthAuth};
pub use oauth_core::http::{HttpRequest, HttpResponse};
pub use oauth_core::memory::{InMemoryCredentialCheck, InMemoryCredentialStore, InMemorySession};
pub use oauth_core::rate_limiter::RateLimiter;
pub use oauth_core::request::{OAuthRequest, has_required_oauth_parameters};
pub use oauth_core::server::OAuthServer;
pub use oauth_core::signature::{HmacSha1, Plaintext, SignatureMethod};
pub use oauth_core::store::{ConsumeResult, CredentialCheck, CredentialStore};
pub use oauth_core::types::{
    Consumer, ConsumerStatus, OAuthError, StoreError, Token, TokenKind, TokenState,
};
