mod health;
mod index;
mod predict;

use crate::{model_service::ModelService, server::SharedState};
use axum::{
    routing::{get, post},
    Router,
};

pub use health::healthcheck;
pub use index::index;
pub use predict::{predict_json, predict_page};

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_page::<M>))
        .route("/api/predict", post(predict_json::<M>))
        .route("/health", get(healthcheck::<M>))
}
