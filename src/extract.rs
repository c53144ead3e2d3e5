//! Binding handler parameters from a request.
//!
//! Every field of a [`Context`](crate::Context) is bound through the
//! [`Extractor`] implementation of its type. The implementation also
//! classifies the field ([`ParamKind`]) so the parameter table of a handler
//! is known when it is registered, before any request arrives.

use crate::http::{Bytes, Request, Response, StatusCode};
use crate::reject::detail;
use crate::schema::{FieldErrors, Object, Schema};
use crate::state::SharedState;
use crate::upload::UploadFile;
use crate::{Reject, Rejection};

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

/// An owned, dynamically typed future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How the request body is parsed for a body parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// JSON decoded and validated against a [`Schema`].
    Schema,
    /// A JSON object, bound as-is.
    RawDict,
    /// `multipart/form-data`, bound as an [`UploadFile`].
    Files,
}

/// How a handler parameter is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// The parameter receives the parsed request body.
    Body(BodyKind),
    /// The parameter receives the raw request, unchanged.
    Request,
    /// The parameter receives the application's shared state.
    SharedState,
    /// The parameter receives a path or query value.
    Param,
}

/// A handler parameter, as seen at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamDescriptor {
    name: &'static str,
    kind: ParamKind,
    required: bool,
}

impl ParamDescriptor {
    pub const fn new(name: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            name,
            kind,
            required,
        }
    }

    /// Describe a parameter bound through `T`'s extractor.
    pub const fn of<T: Extractor>(name: &'static str) -> Self {
        Self::new(name, T::KIND, T::REQUIRED)
    }

    /// Describe the shared state parameter.
    pub const fn shared_state(name: &'static str) -> Self {
        Self::new(name, ParamKind::SharedState, true)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn required(&self) -> bool {
        self.required
    }

    /// Returns `true` if this parameter receives the request body.
    pub fn is_body(&self) -> bool {
        matches!(self.kind, ParamKind::Body(_))
    }
}

/// A type that can be bound to a handler parameter.
///
/// `name` is the name of the parameter, or the URL key it was renamed to
/// with `#[cx(name = "...")]`.
pub trait Extractor: Sized + Send + 'static {
    /// How this type is bound.
    const KIND: ParamKind;

    /// Whether a missing value rejects the request.
    const REQUIRED: bool = true;

    /// Bind the value from the request.
    fn extract<'a>(req: &'a Request, name: &'static str) -> BoxFuture<'a, Result<Self, Rejection>>;
}

impl Extractor for String {
    const KIND: ParamKind = ParamKind::Param;

    fn extract<'a>(req: &'a Request, name: &'static str) -> BoxFuture<'a, Result<Self, Rejection>> {
        Box::pin(async move { param(req, name).map_err(Rejection::from) })
    }
}

impl Extractor for Option<String> {
    const KIND: ParamKind = ParamKind::Param;
    const REQUIRED: bool = false;

    fn extract<'a>(req: &'a Request, name: &'static str) -> BoxFuture<'a, Result<Self, Rejection>> {
        Box::pin(async move { Ok(param(req, name).ok()) })
    }
}

impl Extractor for Request {
    const KIND: ParamKind = ParamKind::Request;

    fn extract<'a>(req: &'a Request, _: &'static str) -> BoxFuture<'a, Result<Self, Rejection>> {
        Box::pin(async move { Ok(req.clone()) })
    }
}

impl Extractor for Object {
    const KIND: ParamKind = ParamKind::Body(BodyKind::RawDict);

    fn extract<'a>(req: &'a Request, _: &'static str) -> BoxFuture<'a, Result<Self, Rejection>> {
        Box::pin(async move { raw_dict(req).map_err(Rejection::from) })
    }
}

impl Extractor for UploadFile {
    const KIND: ParamKind = ParamKind::Body(BodyKind::Files);

    fn extract<'a>(req: &'a Request, _: &'static str) -> BoxFuture<'a, Result<Self, Rejection>> {
        Box::pin(async move { files(req).await.map_err(Rejection::from) })
    }
}

/// Extracts a path parameter, falling back to the query string.
///
/// Values are bound as strings, unconverted.
pub fn param(req: &Request, name: &'static str) -> Result<String, ParamRejection> {
    req.param(name)
        .or_else(|| req.query(name))
        .map(str::to_owned)
        .ok_or(ParamRejection { name })
}

/// Returns the application state visible to the request.
pub fn shared_state(req: &Request) -> SharedState {
    req.state().clone()
}

/// Parse the body as a JSON object, without validation.
pub fn raw_dict(req: &Request) -> Result<Object, BodyRejection> {
    if req.body().is_empty() {
        return Err(BodyRejection(BodyRejectionKind::Empty));
    }

    match json(req.body())? {
        Value::Object(object) => Ok(object),
        _ => Err(BodyRejection(BodyRejectionKind::NotObject)),
    }
}

/// Parse the body as JSON and validate it against `T`.
pub fn schema<T>(req: &Request) -> Result<T, Rejection>
where
    T: Schema,
{
    let value = json(req.body())?;
    T::from_value(value).map_err(|errors| Rejection::from(ValidationRejection(errors)))
}

fn json(body: &Bytes) -> Result<Value, BodyRejection> {
    serde_json::from_slice(body).map_err(|err| BodyRejection(BodyRejectionKind::Syntax(err)))
}

/// Parse the body as `multipart/form-data`.
///
/// An empty body yields an empty container. Parts without a field name
/// are skipped.
pub async fn files(req: &Request) -> Result<UploadFile, MultipartRejection> {
    if req.body().is_empty() {
        return Ok(UploadFile::new());
    }

    let content_type = req
        .content_type()
        .filter(|ty| ty.essence_str() == mime::MULTIPART_FORM_DATA.essence_str())
        .ok_or(MultipartRejection(MultipartRejectionKind::ContentType))?;

    let boundary = content_type
        .get_param(mime::BOUNDARY)
        .map(|boundary| boundary.as_str().to_owned())
        .ok_or(MultipartRejection(MultipartRejectionKind::ContentType))?;

    let body = req.body().clone();
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut files = UploadFile::new();
    while let Some(field) = multipart.next_field().await.map_err(MultipartRejection::parse)? {
        let name = match field.name() {
            Some(name) => name.to_owned(),
            None => continue,
        };

        let data = field.bytes().await.map_err(MultipartRejection::parse)?;
        files.insert(name, data);
    }

    Ok(files)
}

/// The error returned by [`param`] when a required value is missing.
#[derive(Debug)]
pub struct ParamRejection {
    name: &'static str,
}

impl fmt::Display for ParamRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing required parameter '{}'", self.name)
    }
}

impl Reject for ParamRejection {
    fn reject(self) -> Response {
        detail(StatusCode::BAD_REQUEST, self.to_string())
    }
}

/// The error returned when a JSON body is malformed.
#[derive(Debug)]
pub struct BodyRejection(BodyRejectionKind);

#[derive(Debug)]
enum BodyRejectionKind {
    Empty,
    Syntax(serde_json::Error),
    NotObject,
}

impl fmt::Display for BodyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            BodyRejectionKind::Empty => write!(f, "request body is empty"),
            BodyRejectionKind::Syntax(err) => write!(f, "malformed JSON body: {}", err),
            BodyRejectionKind::NotObject => write!(f, "expected a JSON object"),
        }
    }
}

impl Reject for BodyRejection {
    fn reject(self) -> Response {
        detail(StatusCode::BAD_REQUEST, self.to_string())
    }
}

/// The error returned when a body fails schema validation.
#[derive(Debug)]
pub struct ValidationRejection(FieldErrors);

impl ValidationRejection {
    /// The failing fields.
    pub fn errors(&self) -> &FieldErrors {
        &self.0
    }
}

impl fmt::Display for ValidationRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.0)
    }
}

impl Reject for ValidationRejection {
    fn reject(self) -> Response {
        detail(StatusCode::UNPROCESSABLE_ENTITY, self.0)
    }
}

/// The error returned by [`files`] when the body is not valid multipart.
#[derive(Debug)]
pub struct MultipartRejection(MultipartRejectionKind);

#[derive(Debug)]
enum MultipartRejectionKind {
    ContentType,
    Parse(multer::Error),
}

impl MultipartRejection {
    fn parse(err: multer::Error) -> Self {
        MultipartRejection(MultipartRejectionKind::Parse(err))
    }
}

impl fmt::Display for MultipartRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            MultipartRejectionKind::ContentType => {
                write!(f, "expected content-type multipart/form-data with a boundary")
            }
            MultipartRejectionKind::Parse(err) => write!(f, "malformed multipart body: {}", err),
        }
    }
}

impl Reject for MultipartRejection {
    fn reject(self) -> Response {
        detail(StatusCode::BAD_REQUEST, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{header, Method};

    fn request(uri: &str, content_type: Option<&str>, body: &'static [u8]) -> Request {
        let mut req = http::Request::builder().method(Method::POST).uri(uri);
        if let Some(content_type) = content_type {
            req = req.header(header::CONTENT_TYPE, content_type);
        }
        req.body(Bytes::from_static(body)).unwrap().into()
    }

    #[test]
    fn param_falls_back_to_query() {
        let mut req = request("/items/42?limit=5", None, b"");
        req.params = vec![("id".to_owned(), "42".to_owned())].into_iter().collect();

        assert_eq!(param(&req, "id").unwrap(), "42");
        assert_eq!(param(&req, "limit").unwrap(), "5");

        let err = param(&req, "missing").unwrap_err();
        assert_eq!(err.reject().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn raw_dict_requires_an_object() {
        let ok = raw_dict(&request("/", None, br#"{"a": 1}"#)).unwrap();
        assert_eq!(ok.get("a"), Some(&Value::from(1)));

        for body in [&b""[..], &b"{"[..], &b"[1, 2]"[..]] {
            let err = raw_dict(&request("/", None, body)).unwrap_err();
            assert_eq!(err.reject().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn multipart_fields() {
        let body = b"--XyZ\r\n\
            Content-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\n\
            Content-Type: image/png\r\n\
            \r\n\
            png-bytes\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"mask\"\r\n\
            \r\n\
            mask-bytes\r\n\
            --XyZ--\r\n";
        let req = request("/", Some("multipart/form-data; boundary=XyZ"), body);

        let files = files(&req).await.unwrap();
        assert_eq!(files.keys(), ["image", "mask"]);
        assert_eq!(files.get("image").map(|b| &b[..]), Some(&b"png-bytes"[..]));
    }

    #[tokio::test]
    async fn empty_multipart_is_falsy() {
        let req = request("/", Some("multipart/form-data; boundary=XyZ"), b"");
        assert!(files(&req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_multipart() {
        let req = request("/", Some("application/json"), b"{}");
        let err = files(&req).await.unwrap_err();
        assert_eq!(err.reject().status(), StatusCode::BAD_REQUEST);

        let req = request("/", Some("multipart/form-data; boundary=XyZ"), b"garbage");
        let err = files(&req).await.unwrap_err();
        assert_eq!(err.reject().status(), StatusCode::BAD_REQUEST);

        // no boundary
        let req = request("/", Some("multipart/form-data"), b"--XyZ--\r\n");
        assert!(matches!(
            files(&req).await,
            Err(MultipartRejection(MultipartRejectionKind::ContentType))
        ));
    }

    #[tokio::test]
    async fn quoted_boundary() {
        let body = b"--Qq\r\n\
            Content-Disposition: form-data; name=\"doc\"\r\n\
            \r\n\
            text\r\n\
            --Qq--\r\n";
        let req = request("/", Some("multipart/form-data; boundary=\"Qq\""), body);

        let files = files(&req).await.unwrap();
        assert_eq!(files.get("doc").map(|b| &b[..]), Some(&b"text"[..]));
    }
}
