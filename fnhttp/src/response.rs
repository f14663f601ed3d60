//! Translation of failures into HTTP responses

use std::{error::Error as StdError, fmt, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use serde::Serialize;

use crate::{error::message_chain, Error, HttpRequest, HttpRequestStore, Invocation};

/// Finds the filter error behind a failure
///
/// The error itself is checked first, then its immediate source.
pub fn find_filter_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a Error> {
    error
        .downcast_ref::<Error>()
        .or_else(|| error.source().and_then(|s| s.downcast_ref::<Error>()))
}

/// Builds the response body for a failed invocation
pub trait ErrorFormatter: Send + Sync {
    /// Formats `error` as a response
    fn format(&self, error: &(dyn StdError + 'static), request: Option<&HttpRequest>)
        -> Response<Bytes>;
}

/// Formats failures as a JSON object with a `message` and, for binding
/// failures, the offending `parameter`
///
/// Binding failures produce `400 Bad Request`, authentication failures
/// `401 Unauthorized`, authorization failures `403 Forbidden`, and anything
/// else `500 Internal Server Error`.
#[derive(Clone, Copy, Debug)]
pub struct DefaultErrorFormatter {
    output_recursive_messages: bool,
}

impl DefaultErrorFormatter {
    /// Constructs a formatter
    ///
    /// When `output_recursive_messages` is set, the message includes every
    /// underlying cause, separated by `"; "`.
    pub const fn new(output_recursive_messages: bool) -> Self {
        Self {
            output_recursive_messages,
        }
    }
}

impl Default for DefaultErrorFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter: Option<&'a str>,
}

impl ErrorFormatter for DefaultErrorFormatter {
    fn format(
        &self,
        error: &(dyn StdError + 'static),
        _request: Option<&HttpRequest>,
    ) -> Response<Bytes> {
        let known = find_filter_error(error);
        let status = known
            .map(|e| e.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if self.output_recursive_messages {
            message_chain(error)
        } else {
            error.to_string()
        };

        let body = ErrorBody {
            message,
            parameter: known.and_then(Error::parameter),
        };

        json_response(status, &body)
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut resp = Response::new(Bytes::from(bytes));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

/// Produces the response for a failed invocation
#[async_trait]
pub trait ExceptionHandler: Send + Sync {
    /// Handles `error`, with the request if it could be resolved
    async fn handle(
        &self,
        error: &(dyn StdError + Send + Sync + 'static),
        request: Option<&HttpRequest>,
    ) -> Response<Bytes>;
}

/// Delegates to an [`ErrorFormatter`]
#[derive(Clone, Debug, Default)]
pub struct DefaultExceptionHandler<F = DefaultErrorFormatter> {
    formatter: F,
}

impl<F: ErrorFormatter> DefaultExceptionHandler<F> {
    /// Handles failures with `formatter`
    pub const fn new(formatter: F) -> Self {
        Self { formatter }
    }
}

#[async_trait]
impl<F: ErrorFormatter> ExceptionHandler for DefaultExceptionHandler<F> {
    async fn handle(
        &self,
        error: &(dyn StdError + Send + Sync + 'static),
        request: Option<&HttpRequest>,
    ) -> Response<Bytes> {
        self.formatter.format(error, request)
    }
}

/// The terminal stage that reports failed invocations
///
/// Logs the failure, resolves the request through the store, lets the
/// [`ExceptionHandler`] build the response, and releases the store entry.
#[derive(Clone)]
pub struct ExceptionFilter {
    store: Arc<HttpRequestStore>,
    handler: Arc<dyn ExceptionHandler>,
}

impl ExceptionFilter {
    /// Constructs the stage
    pub fn new(store: Arc<HttpRequestStore>, handler: Arc<dyn ExceptionHandler>) -> Self {
        Self { store, handler }
    }

    /// Reports `error` for `invocation`
    pub async fn on_exception(
        &self,
        invocation: &Invocation,
        error: &(dyn StdError + Send + Sync + 'static),
    ) -> Response<Bytes> {
        let description = message_chain(error);
        match find_filter_error(error) {
            Some(e) => tracing::warn!(
                function = %invocation.function_name(),
                invocation.id = %invocation.id(),
                kind = ?e.kind(),
                "invocation rejected: {description}"
            ),
            None => tracing::error!(
                function = %invocation.function_name(),
                invocation.id = %invocation.id(),
                "invocation failed: {description}"
            ),
        }

        let request = self.store.get(invocation.id());
        let response = self.handler.handle(error, request.as_deref()).await;
        self.store.remove(invocation.id());
        response
    }
}

impl fmt::Debug for ExceptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExceptionFilter")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn body(resp: &Response<Bytes>) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[test]
    fn binding_failures_are_bad_requests_with_parameter() {
        let err = Error::parameter_required("Header 'x-id' is required", "id");
        let resp = DefaultErrorFormatter::default().format(&err, None);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(&resp),
            json!({ "message": "Header 'x-id' is required", "parameter": "id" })
        );
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("application/json")
        );
    }

    #[test]
    fn auth_failures_omit_parameter() {
        let resp = DefaultErrorFormatter::default()
            .format(&Error::authentication("Authorization header is missing"), None);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&resp), json!({ "message": "Authorization header is missing" }));

        let resp = DefaultErrorFormatter::default().format(&Error::authorization("Unauthorized"), None);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn recursive_messages_can_be_disabled() {
        let err = Error::authentication_with_source(
            "Token validation failed",
            Error::authentication("signature mismatch"),
        );

        let verbose = DefaultErrorFormatter::new(true).format(&err, None);
        assert_eq!(
            body(&verbose)["message"],
            "Token validation failed; signature mismatch"
        );

        let terse = DefaultErrorFormatter::new(false).format(&err, None);
        assert_eq!(body(&terse)["message"], "Token validation failed");
    }

    #[test]
    fn unknown_failures_are_internal_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let resp = DefaultErrorFormatter::default().format(&err, None);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&resp), json!({ "message": "disk on fire" }));
    }
}
