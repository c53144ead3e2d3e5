use crate::http::Method;

use std::error::Error as StdError;
use std::fmt;

/// A dynamically typed error.
///
/// Handler errors are boxed into this type and propagated to the
/// application's top-level error handling unchanged.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error that occurs while registering a route.
///
/// Registration errors are configuration errors: they surface while the
/// application is being built, before it can accept traffic.
#[derive(Debug)]
pub enum RouteError {
    /// The handler declares more than one parameter that would receive
    /// the request body.
    MultipleBodies {
        method: Method,
        path: String,
        params: Vec<&'static str>,
    },
    /// The path conflicts with an existing route or is malformed.
    Conflict {
        method: Method,
        path: String,
        source: matchit::InsertError,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::MultipleBodies {
                method,
                path,
                params,
            } => write!(
                f,
                "handler for {} {} declares more than one body parameter: {}",
                method,
                path,
                params.join(", ")
            ),
            RouteError::Conflict {
                method,
                path,
                source,
            } => write!(f, "failed to insert route {} {}: {}", method, path, source),
        }
    }
}

impl StdError for RouteError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RouteError::Conflict { source, .. } => Some(source),
            RouteError::MultipleBodies { .. } => None,
        }
    }
}
