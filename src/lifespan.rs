//! Startup and shutdown of process-wide resources.

use crate::error::BoxError;
use crate::state::SharedState;

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// A resource that lives for the whole life of the application.
///
/// The instance returned by [`startup`](Event::startup) is stored in the
/// [`SharedState`] under the event's name.
///
/// ```
/// use quill::{async_trait, BoxError, Event, SharedState};
///
/// struct Greeting;
///
/// #[async_trait]
/// impl Event for Greeting {
///     type Instance = String;
///
///     fn name(&self) -> &str {
///         "greeting"
///     }
///
///     async fn startup(&self, _: &SharedState) -> Result<String, BoxError> {
///         Ok("hello".to_owned())
///     }
/// }
/// ```
#[async_trait]
pub trait Event: Send + Sync + 'static {
    /// The resource created at startup.
    type Instance: Send + Sync + 'static;

    /// The name the instance is stored under.
    fn name(&self) -> &str;

    /// Create the resource. `state` holds every resource started before
    /// this one.
    async fn startup(&self, state: &SharedState) -> Result<Self::Instance, BoxError>;

    /// Release the resource.
    async fn shutdown(&self, instance: &Self::Instance) -> Result<(), BoxError> {
        let _ = instance;
        Ok(())
    }
}

type Instance = Arc<dyn Any + Send + Sync>;

#[async_trait]
trait ErasedEvent: Send + Sync {
    fn name(&self) -> &str;

    async fn startup(&self, state: &SharedState) -> Result<Instance, BoxError>;

    async fn shutdown(&self, instance: &Instance) -> Result<(), BoxError>;
}

#[async_trait]
impl<E> ErasedEvent for E
where
    E: Event,
{
    fn name(&self) -> &str {
        Event::name(self)
    }

    async fn startup(&self, state: &SharedState) -> Result<Instance, BoxError> {
        let instance = Event::startup(self, state).await?;
        Ok(Arc::new(instance))
    }

    async fn shutdown(&self, instance: &Instance) -> Result<(), BoxError> {
        match instance.downcast_ref::<E::Instance>() {
            Some(instance) => Event::shutdown(self, instance).await,
            None => Ok(()),
        }
    }
}

/// Runs [`Event`]s at startup and tears them down at shutdown.
///
/// Events start in registration order and shut down in reverse order.
#[derive(Default)]
pub struct Lifespan {
    events: Vec<Box<dyn ErasedEvent>>,
    provided: SharedState,
    started: usize,
    state: Option<SharedState>,
}

impl Lifespan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event.
    pub fn register<E>(mut self, event: E) -> Self
    where
        E: Event,
    {
        self.events.push(Box::new(event));
        self
    }

    /// Seed the state with a value that needs no startup, such as the
    /// application's settings.
    pub fn provide<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.provided.insert(name, value);
        self
    }

    /// The names of the registered events, in startup order.
    pub fn events(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.name()).collect()
    }

    /// The state built by the last successful startup.
    pub fn state(&self) -> Option<&SharedState> {
        self.state.as_ref()
    }

    /// Start every event and return the resulting state.
    ///
    /// If an event fails to start, the events started before it are shut
    /// down in reverse order and the error is returned.
    ///
    /// Calling this again before [`shutdown`](Lifespan::shutdown) returns the
    /// running state without starting anything.
    pub async fn startup(&mut self) -> Result<SharedState, LifespanError> {
        if let Some(state) = &self.state {
            tracing::warn!("lifespan already started");
            return Ok(state.clone());
        }

        tracing::info!(events = self.events.len(), "starting application lifespan");

        let mut state = self.provided.clone();

        for (i, event) in self.events.iter().enumerate() {
            let name = event.name();
            tracing::info!(event = name, "starting event");

            match event.startup(&state).await {
                Ok(instance) => {
                    state.insert_any(name, instance);
                    tracing::info!(event = name, "event ready");
                }
                Err(source) => {
                    tracing::error!(event = name, error = %source, "event failed to start");
                    teardown(&self.events[..i], &state).await;

                    return Err(LifespanError::Startup {
                        event: name.to_owned(),
                        source,
                    });
                }
            }
        }

        self.started = self.events.len();
        self.state = Some(state.clone());
        tracing::info!(resources = ?state.names(), "application state ready");

        Ok(state)
    }

    /// Shut down every started event in reverse order and clear the state.
    ///
    /// A failing shutdown is logged and does not stop the remaining events.
    pub async fn shutdown(&mut self) {
        tracing::info!("cleaning up application state");

        let state = match self.state.take() {
            Some(state) => state,
            None => {
                tracing::warn!("no state to clean up");
                return;
            }
        };

        teardown(&self.events[..self.started], &state).await;
        self.started = 0;

        tracing::info!("cleanup complete");
    }
}

async fn teardown(events: &[Box<dyn ErasedEvent>], state: &SharedState) {
    for event in events.iter().rev() {
        let name = event.name();

        let instance = match state.get_any(name) {
            Some(instance) => instance,
            None => continue,
        };

        tracing::info!(event = name, "shutting down event");
        match event.shutdown(instance).await {
            Ok(()) => tracing::info!(event = name, "shutdown complete"),
            Err(err) => tracing::error!(event = name, error = %err, "event failed to shut down"),
        }
    }
}

impl fmt::Debug for Lifespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifespan")
            .field("events", &self.events())
            .field("state", &self.state)
            .finish()
    }
}

/// An error that occurs while starting the application.
#[derive(Debug)]
pub enum LifespanError {
    /// An event failed to start.
    Startup { event: String, source: BoxError },
}

impl fmt::Display for LifespanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifespanError::Startup { event, source } => {
                write!(f, "event '{}' failed to start: {}", event, source)
            }
        }
    }
}

impl StdError for LifespanError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            LifespanError::Startup { source, .. } => Some(&**source),
        }
    }
}
