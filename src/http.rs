//! HTTP request and response types.

use std::fmt;

pub use bytes::Bytes;
pub use http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};

use once_cell::sync::OnceCell;

use crate::state::SharedState;

pub type Response = http::Response<Body>;

/// An incoming HTTP request.
///
/// The body is fully buffered, so a request is cheap to clone and can
/// be handed to a handler unchanged while other parameters are parsed
/// from the same bytes.
#[derive(Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    pub(crate) params: Params,
    pub(crate) state: SharedState,
    query: OnceCell<Params>,
}

impl Request {
    /// Create a request from its parts.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            params: Params::default(),
            state: SharedState::default(),
            query: OnceCell::new(),
        }
    }

    /// The request's method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request's URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The path component of the URI.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The request's headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the route parameter with the given name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Returns the first query parameter with the given name.
    ///
    /// The query string is decoded once per request. A query string that
    /// fails to decode behaves as if it were absent.
    pub fn query(&self, name: &str) -> Option<&str> {
        let query = self.uri.query()?;

        self.query
            .get_or_try_init(|| serde_urlencoded::from_str::<Vec<(String, String)>>(query).map(Params))
            .ok()
            .and_then(|params| params.get(name))
    }

    /// The parsed `content-type` header, if present and valid.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.headers
            .get(header::CONTENT_TYPE)?
            .to_str()
            .ok()?
            .parse::<mime::Mime>()
            .ok()
    }

    /// The application state visible to this request.
    pub fn state(&self) -> &SharedState {
        &self.state
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Request::new(parts.method, parts.uri, parts.headers, body)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("body", &self.body.len())
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Params(pub(crate) Vec<(String, String)>);

impl Params {
    pub(crate) fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();

        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, val)| val.as_ref())
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (String, String)>,
    {
        Params(iter.into_iter().collect())
    }
}

/// Respresents the body of an HTTP response.
#[derive(Clone, Default, PartialEq)]
pub struct Body(Option<Bytes>);

impl Body {
    /// Create a body directly from bytes.
    pub fn once(bytes: impl Into<Bytes>) -> Self {
        Body(Some(bytes.into()))
    }

    /// Create an empty `Body`.
    pub fn empty() -> Self {
        Body(None)
    }

    /// Returns `true` if the body carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.as_ref().map_or(true, Bytes::is_empty)
    }

    /// Borrow the body's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_deref().unwrap_or_default()
    }

    /// Convert the body into bytes.
    pub fn into_bytes(self) -> Bytes {
        self.0.unwrap_or_default()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::once(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::once(bytes)
    }
}

impl From<String> for Body {
    fn from(string: String) -> Self {
        Body::once(string)
    }
}

impl From<&'static str> for Body {
    fn from(str: &'static str) -> Self {
        Body::once(str)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").field("len", &self.as_bytes().len()).finish()
    }
}
