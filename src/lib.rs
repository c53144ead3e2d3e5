//! A typed request adapter for building HTTP APIs.
//!
//! Handlers declare what they need from a request through the types of their
//! parameters. Schema types receive the validated JSON body, raw JSON objects
//! and file uploads receive the parsed body, and strings receive path or query
//! values. The parameter table of every handler is built once, when it is
//! registered.
//!
//! ```ignore
//! use quill::{App, Context, Schema, SharedState};
//! use serde::Serialize;
//! use validator::Validate;
//!
//! #[derive(Schema, Serialize, Validate)]
//! struct Prediction {
//!     #[validate(length(min = 1))]
//!     features: Vec<f64>,
//! }
//!
//! #[derive(Context)]
//! struct Predict {
//!     body: Prediction,
//!     global_dependencies: SharedState,
//! }
//!
//! async fn predict(cx: Predict) -> Prediction {
//!     cx.body
//! }
//!
//! let app = App::new().post("/predict", predict)?;
//! ```

macro_rules! insert_route {
    ($name:ident => Method::$method:ident) => {
        #[doc = concat!("Insert a route for the `", stringify!($method), "` method.")]
        pub fn $name<H, T>(self, path: impl Into<String>, handler: H) -> Result<Self, RouteError>
        where
            H: Handler<T>,
            T: 'static,
        {
            self.route(Method::$method, path, handler)
        }
    };
}

mod app;
mod context;
mod error;
mod handler;
mod lifespan;
mod middleware;
mod reject;
mod router;
mod scope;
mod state;
mod upload;

pub mod extract;
pub mod http;
pub mod respond;
pub mod schema;

pub use app::App;
pub use context::Context;
pub use error::{BoxError, RouteError};
pub use extract::{BodyKind, BoxFuture, Extractor, ParamDescriptor, ParamKind};
pub use handler::{register, Handler, Registration};
pub use http::{Body, Request, Response};
pub use lifespan::{Event, Lifespan, LifespanError};
pub use middleware::{Middleware, MiddlewareBuilder, MiddlewareError};
pub use reject::{Reject, Rejection};
pub use scope::Scope;
pub use respond::Respond;
pub use schema::{FieldError, FieldErrors, Schema};
pub use state::SharedState;
pub use upload::UploadFile;

pub use async_trait::async_trait;
pub use quill_codegen::{Context, Schema};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
