//! Project scaffold for ML-serving HTTP APIs.
//!
//! Routes live under [`api`], lifespan resources under [`events`]. Handlers
//! reach the settings and the worker pool through the shared state.

pub mod api;
pub mod events;
pub mod logging;
pub mod settings;

use anyhow::Result;
use quill::http::HeaderValue;
use quill::{App, Lifespan, Middleware, Scope};

use crate::events::WorkerPoolEvent;
use crate::settings::Settings;

/// The name the settings are stored under in the shared state.
pub const SETTINGS: &str = "settings";

/// Build the lifespan: the settings plus a worker pool.
pub fn lifespan(settings: &Settings) -> Lifespan {
    Lifespan::new()
        .provide(SETTINGS, settings.clone())
        .register(WorkerPoolEvent::new(settings.workers()))
}

/// Build the application routes and middleware.
///
/// The shared state is attached once the lifespan has started.
pub fn app(settings: &Settings) -> Result<App> {
    let files = Scope::new("/files").post("/upload", api::files::upload)?;
    let predict = Scope::new("/predict").post("/echo", api::predict::echo)?;

    let version = HeaderValue::from_str(&settings.api_version)?;
    let versioned = Middleware::builder("api-version")
        .after(move |mut res| {
            res.headers_mut().insert("x-api-version", version.clone());
            res
        })
        .build()?;

    let app = App::new()
        .get("/health", api::health::health)?
        .scope(files)?
        .scope(predict)?
        .middleware(versioned);

    Ok(app)
}
