//! Request correlation ids.
//!
//! An `x-request-id` from an upstream proxy is kept when it looks sane
//! (printable ASCII, at most 128 bytes); otherwise a UUID v4 is minted. The id
//! is recorded on the tracing span, tagged on the Sentry scope, stored in the
//! request extensions as [`RequestId`], and echoed on the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_INBOUND_LEN: usize = 128;

/// The id assigned to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

fn inbound_id(request: &Request) -> Option<String> {
    let value = request.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?;
    let value = value.trim();
    let sane = !value.is_empty()
        && value.len() <= MAX_INBOUND_LEN
        && value.bytes().all(|b| b.is_ascii_graphic());
    sane.then(|| value.to_string())
}

/// Assign a request id and propagate it to logs, Sentry and the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = inbound_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn request_with(id: &str) -> Request {
        Request::builder()
            .header(REQUEST_ID_HEADER, id)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_inbound_id_is_kept() {
        assert_eq!(
            inbound_id(&request_with("cf-1234")).as_deref(),
            Some("cf-1234")
        );
    }

    #[test]
    fn test_unusable_inbound_ids_are_replaced() {
        assert_eq!(inbound_id(&request_with("has space")), None);
        assert_eq!(inbound_id(&request_with(&"x".repeat(200))), None);
        assert_eq!(
            inbound_id(&Request::builder().body(Body::empty()).unwrap()),
            None
        );
    }
}
