//! HTTP endpoint
//!
//! - `POST /api/chat`: JSON [`ChatRequest`], `Authorization: Bearer <token>`
//! - `GET /healthz`: liveness
//!
//! Every error body is `{ "error": "<message>" }`.

use crate::chat::{ChatError, ChatRequest, ChatService};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted chat body
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Body over [`MAX_BODY_BYTES`], declared or streamed
#[derive(Debug)]
struct BodyTooLarge;

impl warp::reject::Reject for BodyTooLarge {}

/// All routes, with rejections rendered as JSON errors
pub fn routes(
    service: Arc<ChatService>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    // Paths are matched before methods so a miss on one route never
    // surfaces as the other route's method rejection.
    let chat = warp::path!("api" / "chat")
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(capped_body())
        .and(warp::any().map(move || service.clone()))
        .and_then(chat_handler);

    let health = warp::path!("healthz").and(warp::get()).map(|| {
        warp::reply::json(&json!({ "status": "ok", "version": crate::VERSION }))
    });

    health.or(chat).recover(handle_rejection)
}

/// Request body bounded by [`MAX_BODY_BYTES`]
///
/// A declared `Content-Length` is checked up front; chunked bodies carry no
/// length and are checked once buffered.
fn capped_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|declared: Option<u64>| async move {
            match declared {
                Some(len) if len > MAX_BODY_BYTES => Err(warp::reject::custom(BodyTooLarge)),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::bytes())
        .and_then(|body: Bytes| async move {
            if u64::try_from(body.len()).map_or(true, |len| len > MAX_BODY_BYTES) {
                Err(warp::reject::custom(BodyTooLarge))
            } else {
                Ok(body)
            }
        })
}

/// Bind the routes, serving until `shutdown` resolves
///
/// # Errors
/// `warp::Error` if the address cannot be bound.
pub fn bind(
    service: Arc<ChatService>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), warp::Error> {
    warp::serve(routes(service)).try_bind_with_graceful_shutdown(addr, shutdown)
}

/// Token from an `Authorization` header value
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

async fn chat_handler(
    authorization: Option<String>,
    body: Bytes,
    service: Arc<ChatService>,
) -> Result<Response, Infallible> {
    let bearer = authorization.as_deref().and_then(bearer_token);

    let result = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) => service.handle(bearer, request).await,
        // Unauthenticated callers learn nothing about the body.
        Err(e) => match service.authenticate(bearer).await {
            Ok(_) => Err(ChatError::InvalidRequest(format!("malformed body: {e}"))),
            Err(err) => Err(err),
        },
    };

    Ok(match result {
        Ok(response) => warp::reply::json(&response).into_response(),
        Err(err) => error_reply(&err),
    })
}

fn error_reply(err: &ChatError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "chat request failed");
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "chat request rejected");
    }
    json_error(status, &err.public_message())
}

fn json_error(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
        .into_response()
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if rejection.find::<BodyTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        tracing::warn!(?rejection, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(json_error(status, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_scheme() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
