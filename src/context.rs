use crate::extract::{BoxFuture, ParamDescriptor, ParamKind};
use crate::http::Request;
use crate::Rejection;

/// The parameters of a handler.
///
/// This trait is usually implemented through its derive macro. The kind
/// of each field is chosen from its type:
///
/// ```ignore
/// use quill::{Context, Request, SharedState, UploadFile};
///
/// #[derive(Context)]
/// struct Upload {
///     // parsed from `multipart/form-data`
///     files: UploadFile,
///     // the raw request, unchanged
///     req: Request,
///     // the application's shared state
///     global_dependencies: SharedState,
///     // a path or query parameter
///     #[cx(name = "user-id")]
///     user: String,
///     // an optional query parameter
///     tag: Option<String>,
/// }
///
/// async fn upload(cx: Upload) -> String {
///     format!("{} files from {}", cx.files.len(), cx.user)
/// }
/// ```
pub trait Context: Send + Sized + 'static {
    /// Describe every parameter, in declaration order.
    fn params() -> Vec<ParamDescriptor>;

    /// Bind every parameter from the request.
    ///
    /// Parameters are bound in declaration order and the first failure
    /// rejects the request.
    fn extract<'a>(req: &'a Request) -> BoxFuture<'a, Result<Self, Rejection>>;
}

impl Context for Request {
    fn params() -> Vec<ParamDescriptor> {
        vec![ParamDescriptor::new("req", ParamKind::Request, true)]
    }

    fn extract<'a>(req: &'a Request) -> BoxFuture<'a, Result<Self, Rejection>> {
        Box::pin(async move { Ok(req.clone()) })
    }
}
