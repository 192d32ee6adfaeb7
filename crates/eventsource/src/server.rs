//! Serving event streams from axum handlers.
//!
//! [`respond`] negotiates the response and spawns the caller's handler with
//! an [`Encoder`] whose output becomes the streamed body. The handler's
//! [`CancellationToken`] fires once the client goes away.

use std::future::Future;

use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use http::{HeaderMap, StatusCode, header};
use tokio::io::DuplexStream;
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::debug;

use crate::{encode::Encoder, parse::EVENT_STREAM_MEDIA_TYPE};

/// Bytes buffered between the handler and the response body.
const PIPE_CAPACITY: usize = 16 * 1024;

/// Returns `true` if any media range in the `Accept` headers is the
/// event-stream media type.
pub fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|range| range.split(';').next())
        .any(|media| media.trim().eq_ignore_ascii_case(EVENT_STREAM_MEDIA_TYPE))
}

/// Answer a request with an event stream produced by `handler`.
///
/// Requests that do not accept `text/event-stream` get `406 Not Acceptable`
/// and the handler is never run. Otherwise the response is `200 OK` with
/// `Content-Type: text/event-stream` and `Cache-Control: no-cache`, and the
/// handler runs on its own task. The stream ends when the handler returns
/// and drops its encoder.
///
/// ```rust,ignore
/// async fn events(headers: HeaderMap) -> Response {
///     server::respond(&headers, |mut encoder, disconnected| async move {
///         let _ = encoder.write(&Message::new("hello")).await;
///         disconnected.cancelled().await;
///     })
/// }
/// ```
pub fn respond<F, Fut>(headers: &HeaderMap, handler: F) -> Response
where
    F: FnOnce(Encoder<DuplexStream>, CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if !accepts_event_stream(headers) {
        debug!("Request does not accept an event stream");
        return (
            StatusCode::NOT_ACCEPTABLE,
            [(header::CONTENT_TYPE, EVENT_STREAM_MEDIA_TYPE)],
        )
            .into_response();
    }

    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
    let disconnected = CancellationToken::new();

    // Dropping the body (client gone) drops the guard and cancels the token.
    let guard = disconnected.clone().drop_guard();
    let body = ReaderStream::new(reader).map(move |chunk| {
        let _ = &guard;
        chunk
    });

    tokio::spawn(handler(Encoder::new(writer), disconnected));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, EVENT_STREAM_MEDIA_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
