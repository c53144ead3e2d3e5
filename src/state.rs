use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Resource = Arc<dyn Any + Send + Sync>;

/// Process-wide resources shared with every handler.
///
/// Resources are keyed by name and populated by the [`Lifespan`](crate::Lifespan)
/// before the first request is served. Handlers receive a read-only view by
/// declaring a `global_dependencies: SharedState` parameter.
///
/// Cloning is cheap. Inserting into a clone that is still shared copies the
/// name table, so requests in flight keep the view they started with.
#[derive(Clone, Default)]
pub struct SharedState(Arc<HashMap<String, Resource>>);

impl SharedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resource stored under `name`, if it has type `T`.
    pub fn get<T>(&self, name: &str) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.0.get(name)?.downcast_ref()
    }

    /// Returns a shared handle to the resource stored under `name`,
    /// if it has type `T`.
    pub fn get_arc<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.0.get(name)?.clone().downcast().ok()
    }

    /// Returns `true` if a resource is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The names of every stored resource, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert_any(&mut self, name: impl Into<String>, value: Resource) {
        Arc::make_mut(&mut self.0).insert(name.into(), value);
    }

    pub(crate) fn get_any(&self, name: &str) -> Option<&Resource> {
        self.0.get(name)
    }

    /// Store `value` under `name`, replacing any previous resource.
    pub fn insert<T>(&mut self, name: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.insert_any(name, Arc::new(value));
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedState").field(&self.names()).finish()
    }
}
