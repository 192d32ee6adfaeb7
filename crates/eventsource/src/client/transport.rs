//! HTTP transport abstraction used by the event source.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::BoxError;

/// A streaming response body.
pub type ResponseBody = BoxStream<'static, Result<Bytes, BoxError>>;

/// Performs one HTTP request and hands back status, headers and a streaming
/// body.
///
/// The event source owns the returned body and drops it to close the
/// connection. Errors returned from [`send`](Transport::send) are treated as
/// transient and retried.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a request and return the response with its body unread.
    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<ResponseBody>, BoxError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<ResponseBody>, BoxError> {
        (**self).send(request).await
    }
}

#[cfg(feature = "http")]
pub use self::http_transport::HttpTransport;

#[cfg(feature = "http")]
mod http_transport {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::{StreamExt, TryStreamExt};

    use super::{ResponseBody, Transport};
    use crate::error::{BoxError, EventSourceError};

    /// [`Transport`] backed by a [`reqwest::Client`].
    ///
    /// Only the connect timeout is bounded; the body is read for as long as
    /// the server keeps it open.
    #[derive(Clone, Debug)]
    pub struct HttpTransport {
        client: reqwest::Client,
    }

    impl HttpTransport {
        /// Build a transport with the given connect timeout.
        ///
        /// # Errors
        ///
        /// Returns an error if the HTTP client cannot be constructed.
        pub fn new(connect_timeout: Duration) -> Result<Self, EventSourceError> {
            let client = reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()
                .map_err(|e| EventSourceError::config(format!("Failed to build HTTP client: {e}")))?;
            Ok(Self { client })
        }

        /// Wrap an existing client.
        pub fn from_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn send(
            &self,
            request: http::Request<Bytes>,
        ) -> Result<http::Response<ResponseBody>, BoxError> {
            let (parts, body) = request.into_parts();

            let mut req = self
                .client
                .request(parts.method, parts.uri.to_string())
                .headers(parts.headers);
            if !body.is_empty() {
                req = req.body(body);
            }

            let resp = req.send().await?;

            let status = resp.status();
            let headers = resp.headers().clone();
            let body: ResponseBody = resp.bytes_stream().map_err(BoxError::from).boxed();

            let mut response = http::Response::new(body);
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            Ok(response)
        }
    }
}
