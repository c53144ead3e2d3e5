use crate::error::RouteError;
use crate::handler::{register, Handler, Registration};
use crate::http::{header, HeaderValue, Method, Request, Response, StatusCode};
use crate::middleware::Middleware;
use crate::respond::status;
use crate::router::{Lookup, Router};
use crate::scope::Scope;
use crate::state::SharedState;

use std::fmt;

/// An HTTP application: routes, shared state and middleware.
///
/// ```
/// use quill::{App, Context};
///
/// #[derive(Context)]
/// struct GetItem {
///     id: String,
/// }
///
/// # fn main() -> Result<(), quill::RouteError> {
/// let app = App::new()
///     .get("/health", || async { "ok" })?
///     .get("/items/:id", |cx: GetItem| async move { cx.id })?;
/// # Ok(())
/// # }
/// ```
pub struct App {
    router: Router,
    state: SharedState,
    middleware: Vec<Middleware>,
}

impl App {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            state: SharedState::new(),
            middleware: Vec::new(),
        }
    }

    /// Insert a route for the given method.
    ///
    /// Fails if the handler declares more than one body parameter, or if
    /// the path conflicts with an existing route.
    pub fn route<H, T>(
        mut self,
        method: Method,
        path: impl Into<String>,
        handler: H,
    ) -> Result<Self, RouteError>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.router.insert(register(method, path, handler)?)?;
        Ok(self)
    }

    /// Insert every route of a scope.
    pub fn scope(mut self, scope: Scope) -> Result<Self, RouteError> {
        for registration in scope.into_registrations() {
            self.router.insert(registration)?;
        }

        Ok(self)
    }

    /// Set the state shared with every handler.
    pub fn state(mut self, state: SharedState) -> Self {
        self.state = state;
        self
    }

    /// Add a middleware. Middleware runs in the order it was added.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Every registered route, in insertion order.
    pub fn routes(&self) -> &[Registration] {
        self.router.registrations()
    }

    /// Serve a request.
    ///
    /// This is the application's error boundary: a handler error is logged
    /// and answered with `500 Internal Server Error`.
    pub async fn serve(&self, mut req: Request) -> Response {
        let (registration, params) = match self.router.at(req.method(), req.path()) {
            Lookup::Found(registration, params) => (registration, params),
            Lookup::Redirect(mut location) => {
                if let Some(query) = req.uri().query() {
                    location.push('?');
                    location.push_str(query);
                }

                return match HeaderValue::try_from(location) {
                    Ok(location) => {
                        let mut response = status(StatusCode::PERMANENT_REDIRECT);
                        response.headers_mut().insert(header::LOCATION, location);
                        response
                    }
                    Err(_) => status(StatusCode::NOT_FOUND),
                };
            }
            Lookup::MethodNotAllowed(allowed) => {
                let mut response = status(StatusCode::METHOD_NOT_ALLOWED);
                if let Ok(allowed) = HeaderValue::try_from(allowed) {
                    response.headers_mut().insert(header::ALLOW, allowed);
                }
                return response;
            }
            Lookup::NotFound => return status(StatusCode::NOT_FOUND),
        };

        req.params = params;
        req.state = self.state.clone();

        let middleware = self
            .middleware
            .iter()
            .filter(|middleware| middleware.applies_to(registration.path()))
            .collect::<Vec<_>>();

        for middleware in &middleware {
            req = match middleware.before(req) {
                Ok(req) => req,
                Err(response) => {
                    tracing::debug!(middleware = middleware.name(), "request answered by middleware");
                    return response;
                }
            };
        }

        let method = req.method().clone();
        let path = req.path().to_owned();

        let mut response = match registration.dispatch(req).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(%method, %path, error = %err, "handler failed");
                status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        for middleware in &middleware {
            response = middleware.after(response);
        }

        response
    }

    insert_route!(get => Method::GET);
    insert_route!(put => Method::PUT);
    insert_route!(post => Method::POST);
    insert_route!(delete => Method::DELETE);
    insert_route!(head => Method::HEAD);
    insert_route!(options => Method::OPTIONS);
    insert_route!(patch => Method::PATCH);
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes())
            .field("state", &self.state)
            .field("middleware", &self.middleware)
            .finish()
    }
}
