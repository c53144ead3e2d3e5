use quill::{Context, Schema, SharedState};
use serde::Serialize;
use validator::Validate;

use crate::settings::Settings;
use crate::SETTINGS;

#[derive(Debug, Schema, Serialize, Validate)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Context)]
pub struct Health {
    global_dependencies: SharedState,
}

pub async fn health(cx: Health) -> Result<HealthResponse, super::MissingResource> {
    let settings = cx
        .global_dependencies
        .get::<Settings>(SETTINGS)
        .ok_or(super::MissingResource(SETTINGS))?;

    tracing::info!("health check requested");

    Ok(HealthResponse {
        status: "healthy".to_owned(),
        service: settings.api_name.clone(),
        version: settings.api_version.clone(),
    })
}
