use crate::{model_service::ModelService, server::SharedState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    model_loaded: bool,
    classes: usize,
}

pub async fn healthcheck<M: ModelService>(
    State(state): State<SharedState<M>>,
) -> impl IntoResponse {
    let model_loaded = state.pipeline.is_model_loaded();
    let (code, status) = if model_loaded {
        (StatusCode::OK, "Available")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Degraded")
    };

    (
        code,
        Json(Status {
            status: status.into(),
            model_loaded,
            classes: state.pipeline.labels().len(),
        }),
    )
}
