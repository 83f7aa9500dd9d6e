//! Upload validation, preprocessing, inference and response shaping for a
//! single classification request.
//!
//! Every stage returns its own `Result`; [`PredictionPipeline::run`] folds
//! them into one [`PipelineError`] so the HTTP layer only has to render it.

use crate::{
    labels::ClassLabels,
    model_service::{ModelError, ModelService},
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Side length, in pixels, of the square image the classifier expects.
pub const INPUT_SIZE: u32 = 50;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("failed to read upload: {0}")]
    Read(String),
    #[error("{0}")]
    Decode(#[from] image::ImageError),
    #[error("invalid tensor shape: {0}")]
    Tensor(#[from] ndarray::ShapeError),
    #[error("{0}")]
    Inference(#[from] ModelError),
    #[error("model returned no class scores")]
    EmptyScores,
    #[error("model returned a non-finite score for class {0}")]
    NonFiniteScore(usize),
    #[error("class id {0} has no label")]
    UnknownClass(usize),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Model not loaded. Please check server logs.")]
    ModelUnavailable,
    #[error("No file uploaded. Please select an image.")]
    NoFileProvided,
    #[error("No file selected. Please choose an image.")]
    EmptyFileSelected,
    #[error("Error processing image: {0}")]
    ProcessingFailure(#[from] ProcessingError),
}

/// The `file` field of a submitted form.
#[derive(Debug, Clone)]
pub struct Upload {
    filename: String,
    contents: Result<Vec<u8>, String>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            contents: Ok(bytes),
        }
    }

    /// The field was present but its body could not be read.
    pub fn unreadable(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            contents: Err(reason.into()),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Top class score as a percentage, always displayed with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f32);

impl Confidence {
    /// Scores outside `[0, 1]` are clamped and logged; they usually mean the
    /// model has no softmax output layer.
    pub fn from_score(score: f32) -> Self {
        if Self::needs_clamp(score) {
            tracing::warn!(score, "Class score outside [0, 1], clamping confidence");
        }
        Self(score.clamp(0.0, 1.0) * 100.0)
    }

    fn needs_clamp(score: f32) -> bool {
        !(0.0..=1.0).contains(&score)
    }

    pub fn percent(&self) -> f32 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: Confidence,
    pub class_id: usize,
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ProcessingError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Grayscale, alpha and 16-bit inputs all end up as 8-bit RGB. Alpha is dropped.
pub fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

pub fn resize(image: &RgbImage) -> RgbImage {
    image::imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
}

/// `(H, W, 3)` pixels scaled to `[0, 1]` with a leading batch dimension of 1.
pub fn to_tensor(image: &RgbImage) -> Result<Array4<f32>, ProcessingError> {
    let (width, height) = image.dimensions();
    let data = image
        .as_raw()
        .iter()
        .map(|&value| value as f32 / 255.)
        .collect();

    Ok(Array4::from_shape_vec(
        (1, height as usize, width as usize, 3),
        data,
    )?)
}

pub fn preprocess(bytes: &[u8]) -> Result<Array4<f32>, ProcessingError> {
    let image = to_rgb(decode(bytes)?);
    to_tensor(&resize(&image))
}

/// Index and value of the highest score. Ties go to the lowest index.
pub fn top_class(scores: &[f32]) -> Result<(usize, f32), ProcessingError> {
    if let Some(class_id) = scores.iter().position(|score| !score.is_finite()) {
        return Err(ProcessingError::NonFiniteScore(class_id));
    }

    scores
        .iter()
        .copied()
        .enumerate()
        .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .ok_or(ProcessingError::EmptyScores)
}

pub struct PredictionPipeline<M: ModelService> {
    model: Option<M>,
    labels: ClassLabels,
}

impl<M: ModelService> PredictionPipeline<M> {
    pub fn new(model: Option<M>, labels: ClassLabels) -> Self {
        Self { model, labels }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// The error for a form whose body could not be read at all. Whether it
    /// carried a file is unknown, so this is a processing failure rather than
    /// a missing file. A missing model still takes precedence.
    pub fn unreadable_form(&self, reason: impl Into<String>) -> PipelineError {
        if self.model.is_none() {
            return PipelineError::ModelUnavailable;
        }
        ProcessingError::Read(reason.into()).into()
    }

    pub async fn run(&self, upload: Option<Upload>) -> Result<Prediction, PipelineError> {
        let model = self.model.as_ref().ok_or(PipelineError::ModelUnavailable)?;
        let upload = upload.ok_or(PipelineError::NoFileProvided)?;
        if upload.filename.is_empty() {
            return Err(PipelineError::EmptyFileSelected);
        }

        let bytes = upload.contents.map_err(ProcessingError::Read)?;
        let prediction = self.classify(model, &bytes).await?;
        tracing::debug!(
            filename = %upload.filename,
            class_id = prediction.class_id,
            confidence = %prediction.confidence,
            "Classified upload"
        );

        Ok(prediction)
    }

    async fn classify(&self, model: &M, bytes: &[u8]) -> Result<Prediction, ProcessingError> {
        let input = preprocess(bytes)?;
        let scores = model.predict(input).await?;
        let (class_id, score) = top_class(&scores)?;
        let label = self
            .labels
            .get(class_id)
            .ok_or(ProcessingError::UnknownClass(class_id))?;

        Ok(Prediction {
            label: label.to_string(),
            confidence: Confidence::from_score(score),
            class_id,
        })
    }
}
