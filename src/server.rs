use crate::{model_service::ModelService, pipeline::PredictionPipeline, routes::api_routes};
use axum::{extract::DefaultBodyLimit, Router};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;

pub struct SharedState<M: ModelService> {
    pub pipeline: Arc<PredictionPipeline<M>>,
}

impl<M: ModelService> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
        }
    }
}

pub fn build_router<M: ModelService>(
    pipeline: PredictionPipeline<M>,
    max_upload_bytes: usize,
) -> Router {
    let app_state = SharedState {
        pipeline: Arc::new(pipeline),
    };

    Router::new()
        .merge(api_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(app_state)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: ModelService>(
        pipeline: PredictionPipeline<M>,
        addr: &str,
        max_upload_bytes: usize,
    ) -> anyhow::Result<Self> {
        let router = build_router(pipeline, max_upload_bytes);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
