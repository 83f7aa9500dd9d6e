use crate::{
    config::Config,
    labels::ClassLabels,
    model_service::{validate_output_len, ModelError, ModelService},
    ort_service::OrtModelService,
    pipeline::PredictionPipeline,
    server::HttpServer,
};
use tokio::signal;

/// Loads the ONNX model and checks it against the label table. Any failure is
/// logged and leaves the service without a model.
pub async fn load_model(config: &Config, labels: &ClassLabels) -> Option<OrtModelService> {
    accept_model(OrtModelService::new(&config.model), labels).await
}

/// Keeps a loaded model only if its output width matches the label table.
pub async fn accept_model<M: ModelService>(
    model: Result<M, ModelError>,
    labels: &ClassLabels,
) -> Option<M> {
    let checked = match model {
        Ok(service) => validate_output_len(&service, labels.len())
            .await
            .map(|_| service),
        Err(e) => Err(e),
    };

    match checked {
        Ok(service) => {
            tracing::info!("Model loaded successfully");
            Some(service)
        }
        Err(e) => {
            tracing::error!("Error loading model: {}", e);
            None
        }
    }
}

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let labels = match ClassLabels::from_config(&config.labels) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::error!("Failed to load class labels: {}", e);
            return Err(e.into());
        }
    };

    let model = load_model(&config, &labels).await;
    let pipeline = PredictionPipeline::new(model, labels);

    let addr = config.server.get_address();
    let server = HttpServer::new(pipeline, &addr, config.server.max_upload_bytes).await?;

    server
        .run(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown");
        })
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{LabelsConfig, LogLevel, ModelConfig, ServerConfig},
        pipeline::tests::MockModelService,
    };
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_model_leaves_service_without_model() {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                max_upload_bytes: 1024,
            },
            log_level: LogLevel::Info,
            model: ModelConfig {
                model_dir: PathBuf::from("./missing"),
                onnx_file: "traffic_signs.onnx".to_string(),
                num_instances: 1,
            },
            labels: LabelsConfig::default(),
        };

        assert!(load_model(&config, &ClassLabels::gtsrb()).await.is_none());
    }

    #[tokio::test]
    async fn test_model_with_wrong_output_width_is_rejected() {
        let model = MockModelService::with_scores(vec![0.0; 10]);

        let accepted = accept_model(Ok(model.clone()), &ClassLabels::gtsrb()).await;

        assert!(accepted.is_none());
        assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_with_matching_output_width_is_kept() {
        let model = MockModelService::peaking_at(14, 0.9);

        let accepted = accept_model(Ok(model), &ClassLabels::gtsrb()).await;

        assert!(accepted.is_some());
    }

    #[tokio::test]
    async fn test_load_error_leaves_service_without_model() {
        let error = ModelError::NotFound(PathBuf::from("./missing/traffic_signs.onnx"));

        let accepted = accept_model::<MockModelService>(Err(error), &ClassLabels::gtsrb()).await;

        assert!(accepted.is_none());
    }
}
