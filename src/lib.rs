mod model_service;
mod ort_service;
mod routes;
mod server;
mod view;

pub mod app;
pub mod config;
pub mod labels;
pub mod pipeline;

pub use app::start_app;
pub use model_service::{validate_output_len, ModelError, ModelService};
pub use ort_service::OrtModelService;
pub use server::build_router;
