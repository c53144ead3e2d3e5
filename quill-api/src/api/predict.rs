use quill::{Context, Schema, SharedState};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::events::{PoolError, WorkerPool, WorkerPoolEvent};

#[derive(Debug, Deserialize, Schema, Serialize, Validate)]
pub struct EchoRequest {
    #[validate(length(min = 1))]
    pub features: Vec<f64>,
    #[schema(default = "default_model")]
    #[validate(length(min = 1, max = 64))]
    pub model_name: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f64>,
}

fn default_model() -> String {
    "default".to_owned()
}

#[derive(Debug, Deserialize, Schema, Serialize, Validate)]
pub struct EchoResponse {
    pub model_name: String,
    pub count: usize,
    pub sum: f64,
    pub above_threshold: Option<usize>,
}

#[derive(Context)]
pub struct Echo {
    body: EchoRequest,
    global_dependencies: SharedState,
}

/// Summarize the features on the worker pool.
pub async fn echo(cx: Echo) -> Result<EchoResponse, EchoError> {
    let pool = cx
        .global_dependencies
        .get_arc::<WorkerPool>(WorkerPoolEvent::NAME)
        .ok_or(EchoError::Missing(super::MissingResource(WorkerPoolEvent::NAME)))?;

    let EchoRequest {
        features,
        model_name,
        threshold,
    } = cx.body;

    let (count, sum, above) = pool
        .run(move || {
            let sum = features.iter().sum::<f64>();
            let above = threshold.map(|t| features.iter().filter(|&&f| f > t).count());
            (features.len(), sum, above)
        })
        .await
        .map_err(EchoError::Pool)?;

    Ok(EchoResponse {
        model_name,
        count,
        sum,
        above_threshold: above,
    })
}

#[derive(Debug)]
pub enum EchoError {
    Missing(super::MissingResource),
    Pool(PoolError),
}

impl std::fmt::Display for EchoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EchoError::Missing(err) => err.fmt(f),
            EchoError::Pool(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for EchoError {}
