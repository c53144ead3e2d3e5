use std::borrow::Cow;
use std::convert::Infallible;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::BoxError;
use crate::http::{header, Body, Bytes, Response, StatusCode};

/// A type that can be converted into an HTTP response.
///
/// Handler return values are converted with this trait. A conversion
/// error is treated like a handler error: it is not turned into a
/// client response by the adapter.
pub trait Respond {
    /// An error that can occur during the conversion.
    type Error: Into<BoxError>;

    /// Convert into an HTTP response.
    fn respond(self) -> Result<Response, Self::Error>;

    /// Returns a new responder that adds the provided status
    /// code to the response.
    fn with_status(self, status: StatusCode) -> (StatusCode, Self)
    where
        Self: Sized,
    {
        (status, self)
    }
}

impl Respond for () {
    type Error = Infallible;

    fn respond(self) -> Result<Response, Infallible> {
        Ok(Response::default())
    }
}

impl Respond for Response {
    type Error = Infallible;

    fn respond(self) -> Result<Response, Infallible> {
        Ok(self)
    }
}

impl<T> Respond for (StatusCode, T)
where
    T: Respond,
{
    type Error = T::Error;

    fn respond(self) -> Result<Response, T::Error> {
        self.1.respond().map(|mut response| {
            *response.status_mut() = self.0;
            response
        })
    }
}

impl<T, E> Respond for Result<T, E>
where
    T: Respond,
    E: Into<BoxError>,
{
    type Error = BoxError;

    fn respond(self) -> Result<Response, BoxError> {
        self.map_err(Into::into)
            .and_then(|ok| ok.respond().map_err(Into::into))
    }
}

impl Respond for Map<String, Value> {
    type Error = serde_json::Error;

    fn respond(self) -> Result<Response, serde_json::Error> {
        json(&self)
    }
}

impl Respond for Value {
    type Error = serde_json::Error;

    fn respond(self) -> Result<Response, serde_json::Error> {
        json(&self)
    }
}

/// Serialize a value into a `200 OK` JSON response.
///
/// This is the response conversion used for [`Schema`](crate::Schema) types.
pub fn json<T>(value: &T) -> Result<Response, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(value)?;

    Ok(with_content_type(Body::from(body), "application/json"))
}

fn with_content_type(body: Body, content_type: &'static str) -> Response {
    let mut response = Response::new(body);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(content_type),
    );
    response
}

macro_rules! with_content_type {
    ($($ty:ty $(|$into:ident)? => $content_type:literal),* $(,)?) => { $(
        impl Respond for $ty {
            type Error = Infallible;

            fn respond(self) -> Result<Response, Infallible> {
                Ok(with_content_type(Body::from(self $(.$into())?), $content_type))
            }
        })*
    }
}

with_content_type! {
    Bytes => "application/octet-stream",
    Vec<u8> => "application/octet-stream",
    Cow<'static, [u8]> | into_owned => "application/octet-stream",
    String => "text/plain",
    &'static str => "text/plain",
    Cow<'static, str> | into_owned => "text/plain",
}

/// An empty response with the given status.
pub fn status(status: StatusCode) -> Response {
    let mut response = Response::default();
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_pass_through() {
        let response = "hello".respond().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(response.body().as_bytes(), b"hello");
    }

    #[test]
    fn mappings_serialize_to_json() {
        let mut map = Map::new();
        map.insert("ok".to_owned(), Value::Bool(true));

        let response = map.respond().unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let parsed: Value = serde_json::from_slice(response.body().as_bytes()).unwrap();
        assert_eq!(parsed, serde_json::json!({ "ok": true }));
    }

    #[test]
    fn explicit_status_wins() {
        let response = "created".with_status(StatusCode::CREATED).respond().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn errors_are_not_converted() {
        let result: Result<&'static str, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = result.respond().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
