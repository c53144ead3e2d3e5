//! Request and response hooks.

use crate::http::{Request, Response};

use std::fmt;
use std::sync::Arc;

type Before = Arc<dyn Fn(Request) -> Result<Request, Response> + Send + Sync>;
type After = Arc<dyn Fn(Response) -> Response + Send + Sync>;

/// Hooks that run around matched routes.
///
/// A middleware has a `before` hook, an `after` hook, or both. The `before`
/// hook can replace the request, or answer it directly by returning a
/// response, in which case the handler is not called. The `after` hook can
/// replace the response.
///
/// ```
/// use quill::http::HeaderValue;
/// use quill::Middleware;
///
/// let version = Middleware::builder("api-version")
///     .after(|mut res| {
///         res.headers_mut()
///             .insert("x-api-version", HeaderValue::from_static("1"));
///         res
///     })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Middleware {
    name: String,
    endpoints: Vec<String>,
    before: Option<Before>,
    after: Option<After>,
}

impl Middleware {
    /// Start building a middleware with the given name.
    pub fn builder(name: impl Into<String>) -> MiddlewareBuilder {
        MiddlewareBuilder {
            name: name.into(),
            endpoints: Vec::new(),
            before: None,
            after: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the middleware runs for the given route pattern.
    pub fn applies_to(&self, route: &str) -> bool {
        self.endpoints.is_empty() || self.endpoints.iter().any(|endpoint| endpoint == route)
    }

    pub(crate) fn before(&self, req: Request) -> Result<Request, Response> {
        match &self.before {
            Some(before) => before(req),
            None => Ok(req),
        }
    }

    pub(crate) fn after(&self, res: Response) -> Response {
        match &self.after {
            Some(after) => after(res),
            None => res,
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name)
            .field("endpoints", &self.endpoints)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// A builder for [`Middleware`].
pub struct MiddlewareBuilder {
    name: String,
    endpoints: Vec<String>,
    before: Option<Before>,
    after: Option<After>,
}

impl MiddlewareBuilder {
    /// Only run for the given route patterns.
    ///
    /// Patterns are compared with the pattern a route was registered with,
    /// including any scope prefix. By default the middleware runs for every
    /// route.
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(endpoints.into_iter().map(Into::into));
        self
    }

    /// Run a hook before the handler.
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(Request) -> Result<Request, Response> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    /// Run a hook after the handler.
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(Response) -> Response + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    /// Build the middleware.
    ///
    /// Fails if neither hook was set.
    pub fn build(self) -> Result<Middleware, MiddlewareError> {
        if self.before.is_none() && self.after.is_none() {
            return Err(MiddlewareError::NoHooks { name: self.name });
        }

        Ok(Middleware {
            name: self.name,
            endpoints: self.endpoints,
            before: self.before,
            after: self.after,
        })
    }
}

/// An error that occurs while building a [`Middleware`].
#[derive(Debug)]
pub enum MiddlewareError {
    /// Neither a `before` nor an `after` hook was set.
    NoHooks { name: String },
}

impl fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareError::NoHooks { name } => write!(
                f,
                "middleware '{}' must define a `before` or an `after` hook",
                name
            ),
        }
    }
}

impl std::error::Error for MiddlewareError {}
