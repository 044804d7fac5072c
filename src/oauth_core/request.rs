//! Normalized view of an inbound OAuth-signed request.
//!
//! Parameters are drawn from the `Authorization` header, the form body and
//! the query string, percent-decoded once, merged with header > body > query
//! precedence, and re-encoded canonically when the signature base string is
//! built (RFC 5849 section 3.4.1). Normalization is deterministic: the same
//! parameters produce the same base string regardless of source or order.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use url::Url;

use super::http::HttpRequest;
use super::types::{OAuthError, oauth_encode};

/// Parameters every signed request must carry. `oauth_token` is absent only
/// for the request-token step, `oauth_signature` is checked separately.
pub const REQUIRED_PARAMETERS: [&str; 6] = [
    "oauth_consumer_key",
    "oauth_token",
    "oauth_signature_method",
    "oauth_signature",
    "oauth_timestamp",
    "oauth_nonce",
];

/// Immutable, normalized snapshot of one inbound request's OAuth-relevant
/// parts: method, base URL (query string excluded) and the merged parameter
/// set.
#[derive(Debug, Clone)]
pub struct OAuthRequest {
    method: String,
    base_url: String,
    parameters: BTreeMap<String, String>,
}

impl OAuthRequest {
    /// Builds a normalized request from the boundary type.
    ///
    /// Fails with [`OAuthError::MalformedRequest`] when the URL cannot be
    /// parsed; missing protocol parameters are a validation concern reported
    /// by the server, not here.
    pub fn from_http(request: &HttpRequest) -> Result<Self, OAuthError> {
        let parsed = Url::parse(&request.url).map_err(|_| OAuthError::MalformedRequest)?;
        let host = parsed.host_str().ok_or(OAuthError::MalformedRequest)?;
        let mut base_url = format!("{}://{}", parsed.scheme(), host);
        // Url::port() is None for a scheme's default port, which RFC 5849
        // excludes from the base string URL.
        if let Some(port) = parsed.port() {
            base_url.push_str(&format!(":{port}"));
        }
        base_url.push_str(parsed.path());

        let mut parameters = BTreeMap::new();
        for (k, v) in request.query_params() {
            parameters.insert(k, v);
        }
        for (k, v) in request.body_params() {
            parameters.insert(k, v);
        }
        if let Some(header_params) = authorization_header_parameters(request) {
            for (k, v) in header_params {
                parameters.insert(k, v);
            }
        }

        Ok(OAuthRequest {
            method: request.method.to_uppercase(),
            base_url,
            parameters,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Scheme, host and path of the request, query string excluded.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// A parameter the protocol requires, mapping absence to
    /// [`OAuthError::MalformedRequest`].
    pub fn require(&self, name: &str) -> Result<&str, OAuthError> {
        self.parameter(name).ok_or(OAuthError::MalformedRequest)
    }

    pub fn consumer_key(&self) -> Result<&str, OAuthError> {
        self.require("oauth_consumer_key")
    }

    pub fn token_key(&self) -> Result<&str, OAuthError> {
        self.require("oauth_token")
    }

    pub fn signature(&self) -> Result<&str, OAuthError> {
        self.require("oauth_signature")
    }

    pub fn signature_method(&self) -> Result<&str, OAuthError> {
        self.require("oauth_signature_method")
    }

    pub fn nonce(&self) -> Result<&str, OAuthError> {
        self.require("oauth_nonce")
    }

    /// The timestamp as seconds since the epoch; an unparseable value is as
    /// malformed as a missing one.
    pub fn timestamp(&self) -> Result<i64, OAuthError> {
        self.require("oauth_timestamp")?
            .parse()
            .map_err(|_| OAuthError::MalformedRequest)
    }

    pub fn callback(&self) -> Option<&str> {
        self.parameter("oauth_callback")
    }

    pub fn verifier(&self) -> Option<&str> {
        self.parameter("oauth_verifier")
    }

    /// Checks that every required parameter is present. The request-token
    /// step passes `require_token = false` since no token exists yet.
    pub fn validate_required_parameters(&self, require_token: bool) -> Result<(), OAuthError> {
        for name in REQUIRED_PARAMETERS {
            if name == "oauth_token" && !require_token {
                continue;
            }
            self.require(name)?;
        }
        Ok(())
    }

    /// Sorted `key=value` pairs joined by `&`, canonically re-encoded, with
    /// `oauth_signature` excluded. Also what the consent page shows.
    pub fn normalized_parameters(&self) -> String {
        self.parameters
            .iter()
            .filter(|(k, _)| k.as_str() != "oauth_signature")
            .map(|(k, v)| format!("{}={}", oauth_encode(k), oauth_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// The string that is actually signed and verified:
    /// `METHOD&encoded_base_url&encoded_sorted_parameters`.
    pub fn signature_base_string(&self) -> String {
        format!(
            "{}&{}&{}",
            self.method,
            oauth_encode(&self.base_url),
            oauth_encode(&self.normalized_parameters()),
        )
    }
}

/// Parses `Authorization: OAuth k="v", ...` into a percent-decoded parameter
/// map. Returns `None` when the header is absent or carries another scheme.
/// The `realm` attribute is part of the challenge framing, not a protocol
/// parameter, and is skipped.
pub fn authorization_header_parameters(request: &HttpRequest) -> Option<BTreeMap<String, String>> {
    let value = request.header("authorization")?;
    let (scheme, rest) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("oauth") {
        return None;
    }
    let mut params = BTreeMap::new();
    for part in rest.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("realm") {
            continue;
        }
        let value = value.trim().trim_matches('"');
        params.insert(
            percent_decode_str(key).decode_utf8_lossy().into_owned(),
            percent_decode_str(value).decode_utf8_lossy().into_owned(),
        );
    }
    Some(params)
}

/// Structural pre-check used by the OAuth authentication handler: the header
/// parameter set alone, or the combined query/body set alone, must contain
/// every required parameter. Partial sets are never merged across sources
/// for this check.
pub fn has_required_oauth_parameters(request: &HttpRequest) -> bool {
    let complete = |params: &BTreeMap<String, String>| {
        REQUIRED_PARAMETERS.iter().all(|p| params.contains_key(*p))
    };
    if let Some(header_params) = authorization_header_parameters(request) {
        if complete(&header_params) {
            return true;
        }
    }
    let mut combined = BTreeMap::new();
    for (k, v) in request.query_params() {
        combined.insert(k, v);
    }
    for (k, v) in request.body_params() {
        combined.insert(k, v);
    }
    complete(&combined)
}
