use crate::http::{header, Body, Response, StatusCode};

use std::fmt::{self, Debug, Display};

use serde::Serialize;

/// An error capable of rejecting a request with an HTTP error response.
///
/// Rejections are produced while binding handler parameters, before the
/// handler runs.
pub trait Reject: Debug + Display + Send + Sync {
    /// Reject the request with an HTTP error response.
    fn reject(self) -> Response;
}

/// A dynamically typed rejection.
pub struct Rejection {
    inner: Box<dyn BoxedReject>,
}

impl Rejection {
    /// Create a new `Rejection`.
    pub fn new<E>(err: E) -> Self
    where
        E: Reject + 'static,
    {
        Self {
            inner: Box::new(err),
        }
    }

    /// Convert this error into an HTTP response.
    ///
    /// This method is analogous to [`Reject::reject`],
    /// which cannot be implemented directly due to
    /// coherence rules.
    pub fn reject(self) -> Response {
        self.inner.reject()
    }
}

trait BoxedReject: Reject {
    fn reject(self: Box<Self>) -> Response;
}

impl<T: Reject> BoxedReject for T {
    fn reject(self: Box<Self>) -> Response {
        Reject::reject(*self)
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl<E> From<E> for Rejection
where
    E: Reject + 'static,
{
    fn from(err: E) -> Self {
        Rejection::new(err)
    }
}

/// Build a JSON error response of the form `{"detail": ...}`.
pub(crate) fn detail(status: StatusCode, detail: impl Serialize) -> Response {
    let body = serde_json::to_vec(&serde_json::json!({ "detail": detail }))
        .map(Body::from)
        .unwrap_or_default();

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
