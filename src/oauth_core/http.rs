//! Framework-boundary HTTP value types.
//!
//! The surrounding web framework's request/response objects are out of scope;
//! adapters translate them into these plain value types at the edge, and the
//! handlers and endpoints in this crate only ever see these.

use url::form_urlencoded;

/// A snapshot of one inbound HTTP request, as handed over by the framework
/// adapter, plus the identity slots the authentication handlers fill in.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, ...).
    pub method: String,
    /// Absolute request URL, query string included.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Raw request body, if any.
    pub body: Option<Vec<u8>>,
    /// Authenticated identity, bound by a handler on success.
    pub user: Option<String>,
    /// Rate-limiting key, bound by the OAuth handler (the consumer key).
    pub throttle_key: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        HttpRequest {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            user: None,
            throttle_key: None,
        }
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets an `application/x-www-form-urlencoded` body.
    pub fn with_form_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into().into_bytes());
        self.headers.push((
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ));
        self
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The raw query string, without the leading `?`.
    pub fn query_string(&self) -> &str {
        match self.url.split_once('?') {
            Some((_, q)) => q,
            None => "",
        }
    }

    /// Percent-decoded query parameters, in order of appearance.
    pub fn query_params(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(self.query_string().as_bytes())
            .into_owned()
            .collect()
    }

    /// Percent-decoded body parameters, when the body is a form.
    ///
    /// A missing `Content-Type` is treated as a form for compatibility with
    /// clients that omit it on signed requests.
    pub fn body_params(&self) -> Vec<(String, String)> {
        let is_form = match self.header("content-type") {
            Some(ct) => ct
                .split(';')
                .next()
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded")),
            None => true,
        };
        match (&self.body, is_form) {
            (Some(body), true) => form_urlencoded::parse(body).into_owned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Response handed back to the framework adapter.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 200 with an `application/x-www-form-urlencoded` body.
    pub fn ok_urlencoded(body: impl Into<String>) -> Self {
        HttpResponse {
            status: 200,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: body.into().into_bytes(),
        }
    }

    /// Plain-text response with an arbitrary status.
    pub fn status_text(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.into().into_bytes(),
        }
    }

    /// 200 with an HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/html; charset=utf-8".to_string())],
            body: body.into().into_bytes(),
        }
    }

    /// 302 redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        HttpResponse {
            status: 302,
            headers: vec![("Location".to_string(), location.into())],
            body: Vec::new(),
        }
    }

    /// 401 with a `WWW-Authenticate` challenge and an urlencoded body.
    pub fn unauthorized_urlencoded(www_authenticate: &str, body: impl Into<String>) -> Self {
        HttpResponse {
            status: 401,
            headers: vec![
                ("WWW-Authenticate".to_string(), www_authenticate.to_string()),
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
            ],
            body: body.into().into_bytes(),
        }
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8, lossily.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
