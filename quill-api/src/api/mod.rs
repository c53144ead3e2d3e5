pub mod files;
pub mod health;
pub mod predict;

use std::fmt;

/// A handler needed a resource the lifespan did not provide.
#[derive(Debug)]
pub struct MissingResource(pub &'static str);

impl fmt::Display for MissingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shared state has no resource named '{}'", self.0)
    }
}

impl std::error::Error for MissingResource {}
