//! Event source configuration.

use std::time::Duration;

use bytes::Bytes;

use crate::error::EventSourceError;

/// Configuration for an [`EventSource`](super::EventSource).
///
/// The request described here is the template reused for every connection
/// attempt; only its `Last-Event-Id` header changes between attempts.
#[derive(Clone, Debug)]
pub struct EventSourceConfig {
    /// SSE endpoint URL.
    pub url: String,
    /// HTTP method (usually GET, some APIs use POST).
    pub method: http::Method,
    /// Additional HTTP headers to include with every request.
    pub headers: http::HeaderMap,
    /// Optional request body (for POST-based SSE).
    pub body: Option<Bytes>,
    /// Fixed delay before every reconnection attempt.
    pub retry: Duration,
    /// Connection timeout, applied by [`HttpTransport`](super::HttpTransport).
    pub connect_timeout: Duration,
}

impl Default for EventSourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: http::Method::GET,
            headers: http::HeaderMap::new(),
            body: None,
            retry: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl EventSourceConfig {
    /// Create a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the HTTP method (e.g., `POST` for POST-based SSE).
    #[must_use]
    pub fn method(mut self, method: http::Method) -> Self {
        self.method = method;
        self
    }

    /// Set additional HTTP headers.
    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body (for POST-based SSE).
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the delay between reconnection attempts.
    #[must_use]
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration and parse the URL.
    ///
    /// # Errors
    ///
    /// Returns [`EventSourceError::Config`] if the URL is empty or is not a
    /// valid absolute URI.
    pub fn validate(&self) -> Result<http::Uri, EventSourceError> {
        if self.url.is_empty() {
            return Err(EventSourceError::config("URL cannot be empty"));
        }
        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e| EventSourceError::config(format!("Invalid URL {:?}: {e}", self.url)))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(EventSourceError::config(format!(
                "URL must be absolute: {:?}",
                self.url
            )));
        }
        Ok(uri)
    }
}
