use crate::error::RouteError;
use crate::handler::{register, Handler, Registration};
use crate::http::Method;

/// Routes grouped under a common prefix.
///
/// ```
/// use quill::{App, Scope};
///
/// # fn main() -> Result<(), quill::RouteError> {
/// let files = Scope::new("/files").post("/upload", || async { "uploaded" })?;
/// let app = App::new().scope(files)?;
///
/// assert_eq!(app.routes()[0].path(), "/files/upload");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Scope {
    prefix: String,
    registrations: Vec<Registration>,
}

impl Scope {
    /// Create a scope for the given path prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }

        Self {
            prefix,
            registrations: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Insert a route under this scope's prefix.
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
        let path = join(&self.prefix, &path.into());
        self.registrations.push(register(method, path, handler)?);
        Ok(self)
    }

    pub(crate) fn into_registrations(self) -> Vec<Registration> {
        self.registrations
    }

    insert_route!(get => Method::GET);
    insert_route!(put => Method::PUT);
    insert_route!(post => Method::POST);
    insert_route!(delete => Method::DELETE);
    insert_route!(head => Method::HEAD);
    insert_route!(options => Method::OPTIONS);
    insert_route!(patch => Method::PATCH);
}

fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() && !prefix.is_empty() {
        prefix.to_owned()
    } else {
        format!("{}/{}", prefix, path)
    }
}
