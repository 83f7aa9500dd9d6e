use crate::pipeline::INPUT_SIZE;
use async_trait::async_trait;
use ndarray::Array4;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Session mutex poisoned: {0}")]
    SessionPoisoned(String),
    #[error("Model has no outputs")]
    MissingOutput,
    #[error("Model outputs {actual} class scores but {expected} labels are configured")]
    OutputMismatch { expected: usize, actual: usize },
    #[error("Inference worker failed: {0}")]
    Worker(String),
}

/// A loaded classifier. Takes a `(1, H, W, 3)` batch and returns one score per class.
#[async_trait]
pub trait ModelService: Send + Sync + Clone + 'static {
    async fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, ModelError>;
}

/// Runs a zero tensor through the model and checks the number of class scores
/// against the label table.
pub async fn validate_output_len<M: ModelService>(
    model: &M,
    expected: usize,
) -> Result<(), ModelError> {
    let size = INPUT_SIZE as usize;
    let actual = model.predict(Array4::zeros((1, size, size, 3))).await?.len();
    if actual != expected {
        return Err(ModelError::OutputMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{labels::GTSRB_CLASS_COUNT, pipeline::tests::MockModelService};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_output_len_matches_label_table() {
        let model = MockModelService::peaking_at(14, 0.9);

        validate_output_len(&model, GTSRB_CLASS_COUNT).await.unwrap();

        let input = model.last_input.lock().unwrap().take().unwrap();
        assert_eq!(input.shape(), &[1, 50, 50, 3]);
        assert!(input.iter().all(|&v| v == 0.0));
    }

    #[tokio::test]
    async fn test_output_len_mismatch() {
        let model = MockModelService::with_scores(vec![0.0; 10]);

        let result = validate_output_len(&model, GTSRB_CLASS_COUNT).await;

        assert!(matches!(
            result,
            Err(ModelError::OutputMismatch {
                expected: 43,
                actual: 10
            })
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
