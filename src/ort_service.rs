use crate::{
    config::{ModelConfig, Validatable},
    model_service::{ModelError, ModelService},
};
use async_trait::async_trait;
use ndarray::Array4;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

fn load_session(path: &Path) -> Result<Session, ort::Error> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(path)?;
    Ok(session)
}

/// Pool of ONNX Runtime sessions. `Session::run` needs exclusive access, so
/// requests are spread round-robin across independently locked sessions.
#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: Arc<str>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        let model_path = model_config.get_path();
        if model_config.validate().is_err() {
            return Err(ModelError::NotFound(model_path));
        }

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| Ok(Arc::new(Mutex::new(load_session(&model_path)?))))
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let output_name = sessions[0]
            .lock()
            .map_err(|e| ModelError::SessionPoisoned(e.to_string()))?
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or(ModelError::MissingOutput)?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}, reading output `{}`",
            num_instances,
            model_path,
            output_name
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name: output_name.into(),
        })
    }

    pub fn run_inference(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::SessionPoisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().into_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;
        let (_, scores) = outputs[&*self.output_name].try_extract_tensor::<f32>()?;

        Ok(scores.to_vec())
    }
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.run_inference(&input))
            .await
            .map_err(|e| ModelError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_model_file_is_reported_before_loading() {
        let model_config = ModelConfig {
            model_dir: PathBuf::from("./no_such_dir"),
            onnx_file: "traffic_signs.onnx".to_string(),
            num_instances: 2,
        };

        let result = OrtModelService::new(&model_config);

        match result {
            Err(ModelError::NotFound(path)) => {
                assert_eq!(path, PathBuf::from("./no_such_dir/traffic_signs.onnx"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("model should not load"),
        }
    }
}
