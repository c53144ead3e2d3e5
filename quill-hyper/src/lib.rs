//! Serve a [`quill::App`] over HTTP with hyper.

use std::convert::Infallible;
use std::fmt;
use std::future::{ready, Future, Ready};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper::body::HttpBody;
use hyper::server::conn::AddrIncoming;
use hyper::service::Service;
use quill::http::{Bytes, StatusCode};
use quill::App;

pub use hyper::Server;

/// Limits applied to incoming requests.
#[derive(Clone, Debug)]
pub struct ServeConfig {
    max_body_size: usize,
}

impl ServeConfig {
    /// Create a [`ServeConfig`] instance.
    pub fn new() -> Self {
        Self {
            max_body_size: 2_097_152, // (~2mb)
        }
    }

    /// Set the maximum number of body bytes buffered per request.
    ///
    /// Larger requests are answered with `413 Payload Too Large`. By
    /// default the limit is 2mb.
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Serve {
    /// Bind to the address and serve the application.
    fn bind(
        self,
        addr: SocketAddr,
        config: ServeConfig,
    ) -> hyper::Result<Server<AddrIncoming, QuillMakeService>>;

    fn into_make_service(self, config: ServeConfig) -> QuillMakeService;

    fn into_service(self, config: ServeConfig) -> QuillService;
}

impl Serve for App {
    fn bind(
        self,
        addr: SocketAddr,
        config: ServeConfig,
    ) -> hyper::Result<Server<AddrIncoming, QuillMakeService>> {
        let server = hyper::Server::try_bind(&addr)?.serve(self.into_make_service(config));
        tracing::info!(addr = %server.local_addr(), "listening");
        Ok(server)
    }

    fn into_make_service(self, config: ServeConfig) -> QuillMakeService {
        QuillMakeService {
            service: self.into_service(config),
        }
    }

    fn into_service(self, config: ServeConfig) -> QuillService {
        QuillService {
            app: Arc::new(self),
            config: Arc::new(config),
        }
    }
}

pub struct QuillMakeService {
    service: QuillService,
}

impl<T> Service<T> for QuillMakeService {
    type Response = QuillService;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _: T) -> Self::Future {
        ready(Ok(self.service.clone()))
    }
}

#[derive(Clone)]
pub struct QuillService {
    app: Arc<App>,
    config: Arc<ServeConfig>,
}

impl Service<hyper::Request<hyper::Body>> for QuillService {
    type Response = hyper::Response<hyper::Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: hyper::Request<hyper::Body>) -> Self::Future {
        let (parts, body) = req.into_parts();
        let app = self.app.clone();
        let limit = self.config.max_body_size;

        Box::pin(async move {
            let body = match collect(body, limit).await {
                Ok(body) => body,
                Err(err) => {
                    tracing::debug!(method = %parts.method, uri = %parts.uri, error = %err, "failed to read body");
                    return Ok(status(err.status()));
                }
            };

            let req = quill::Request::new(parts.method, parts.uri, parts.headers, body);
            let (parts, body) = app.serve(req).await.into_parts();

            Ok(hyper::Response::from_parts(
                parts,
                hyper::Body::from(body.into_bytes()),
            ))
        })
    }
}

async fn collect(mut body: hyper::Body, limit: usize) -> Result<Bytes, BodyError> {
    if body.size_hint().lower() > limit as u64 {
        return Err(BodyError::TooLarge);
    }

    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(BodyError::Read)?;
        if buf.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge);
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

#[derive(Debug)]
enum BodyError {
    TooLarge,
    Read(hyper::Error),
}

impl BodyError {
    fn status(&self) -> StatusCode {
        match self {
            BodyError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::Read(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyError::TooLarge => write!(f, "request body exceeds the configured limit"),
            BodyError::Read(err) => write!(f, "failed to read request body: {}", err),
        }
    }
}

fn status(status: StatusCode) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(hyper::Body::empty());
    *response.status_mut() = status;
    response
}
