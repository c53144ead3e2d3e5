//! Asynchronous functions that can handle HTTP requests.

use crate::context::Context;
use crate::error::{BoxError, RouteError};
use crate::extract::ParamDescriptor;
use crate::http::{Method, Request, Response};
use crate::{Rejection, Respond};

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

/// An asynchronous HTTP handler.
///
/// You should not need to interact with this trait directly, it is
/// implemented for async functions taking no arguments or a single
/// [`Context`].
#[async_trait]
pub trait Handler<T>: Send + Sync + 'static {
    /// The handler's response.
    type Response: Respond;

    /// The handler's parameters, in declaration order.
    fn params() -> Vec<ParamDescriptor>;

    /// Bind the handler's parameters and call it.
    async fn call(&self, req: &Request) -> Result<Self::Response, Rejection>;
}

#[async_trait]
impl<F, O, R> Handler<()> for F
where
    F: Fn() -> O + Send + Sync + 'static,
    O: Future<Output = R> + Send + 'static,
    R: Respond + 'static,
{
    type Response = R;

    fn params() -> Vec<ParamDescriptor> {
        Vec::new()
    }

    async fn call(&self, _: &Request) -> Result<R, Rejection> {
        Ok(self().await)
    }
}

#[async_trait]
impl<F, C, O, R> Handler<(C,)> for F
where
    F: Fn(C) -> O + Send + Sync + 'static,
    C: Context,
    O: Future<Output = R> + Send + 'static,
    R: Respond + 'static,
{
    type Response = R;

    fn params() -> Vec<ParamDescriptor> {
        C::params()
    }

    async fn call(&self, req: &Request) -> Result<R, Rejection> {
        let cx = C::extract(req).await?;
        Ok(self(cx).await)
    }
}

/// A type-erased handler.
#[async_trait]
trait Endpoint: Send + Sync + 'static {
    async fn call(&self, req: &Request) -> Result<Response, BoxError>;
}

struct Extract<H, T> {
    handler: H,
    _cx: PhantomData<fn() -> T>,
}

#[async_trait]
impl<H, T> Endpoint for Extract<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    async fn call(&self, req: &Request) -> Result<Response, BoxError> {
        match self.handler.call(req).await {
            Ok(response) => response.respond().map_err(Into::into),
            Err(rejection) => {
                tracing::debug!(
                    method = %req.method(),
                    path = req.path(),
                    %rejection,
                    "rejected request"
                );
                Ok(rejection.reject())
            }
        }
    }
}

/// A handler bound to a method and path.
///
/// The parameter table is collected once, when the handler is registered.
/// A registration is immutable.
pub struct Registration {
    method: Method,
    path: String,
    params: Vec<ParamDescriptor>,
    endpoint: Box<dyn Endpoint>,
}

/// Register a handler for the given method and path.
///
/// Fails if the handler declares more than one parameter that would
/// receive the request body.
///
/// ```ignore
/// use quill::http::Method;
/// use quill::{register, Context};
///
/// #[derive(Context)]
/// struct GetItem {
///     id: String,
/// }
///
/// async fn get_item(cx: GetItem) -> String {
///     cx.id
/// }
///
/// let registration = register(Method::GET, "/items/:id", get_item)?;
/// ```
pub fn register<H, T>(
    method: Method,
    path: impl Into<String>,
    handler: H,
) -> Result<Registration, RouteError>
where
    H: Handler<T>,
    T: 'static,
{
    let path = path.into();
    let params = H::params();

    let bodies = params
        .iter()
        .filter(|param| param.is_body())
        .map(ParamDescriptor::name)
        .collect::<Vec<_>>();

    if bodies.len() > 1 {
        return Err(RouteError::MultipleBodies {
            method,
            path,
            params: bodies,
        });
    }

    tracing::debug!(%method, %path, params = params.len(), "registered handler");

    Ok(Registration {
        method,
        path,
        params,
        endpoint: Box::new(Extract {
            handler,
            _cx: PhantomData,
        }),
    })
}

impl Registration {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The handler's parameters, in declaration order.
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// The parameter receiving the request body, if any.
    pub fn body_param(&self) -> Option<&ParamDescriptor> {
        self.params.iter().find(|param| param.is_body())
    }

    /// Bind the handler's parameters from the request, call it, and convert
    /// its return value into a response.
    ///
    /// Requests that fail to bind are answered with a client error and the
    /// handler is not called. Errors returned by the handler, or by the
    /// conversion of its return value, are propagated unchanged.
    pub async fn dispatch(&self, req: Request) -> Result<Response, BoxError> {
        self.endpoint.call(&req).await
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish()
    }
}
