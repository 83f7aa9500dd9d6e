use crate::{
    model_service::ModelService,
    pipeline::{PipelineError, Prediction, Upload},
    server::SharedState,
    view::{render, PageView},
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn status_code(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::NoFileProvided | PipelineError::EmptyFileSelected => {
            StatusCode::BAD_REQUEST
        }
        PipelineError::ProcessingFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Finds the first `file` field carrying a filename. Text fields named `file`
/// are not uploads and are skipped. `Err` means the form body itself could not
/// be read, e.g. because it exceeds the upload limit.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<Upload>, String> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!("Request is not a multipart form: {}", rejection);
            return Ok(None);
        }
    };

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(FILE_FIELD) {
                    continue;
                }
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                return Ok(Some(match field.bytes().await {
                    Ok(bytes) => Upload::new(filename, bytes.to_vec()),
                    Err(e) => Upload::unreadable(filename, e.body_text()),
                }));
            }
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("Failed to read multipart form: {}", e);
                return Err(e.body_text());
            }
        }
    }
}

async fn run_pipeline<M: ModelService>(
    state: &SharedState<M>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Prediction, PipelineError> {
    let result = match read_upload(multipart).await {
        Ok(upload) => state.pipeline.run(upload).await,
        Err(reason) => Err(state.pipeline.unreadable_form(reason)),
    };
    if let Err(err) = &result {
        tracing::warn!("Prediction failed: {}", err);
    }
    result
}

#[instrument(skip(state, multipart))]
pub async fn predict_page<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match run_pipeline(&state, multipart).await {
        Ok(prediction) => render(PageView::Result(&prediction)).into_response(),
        Err(err) => (
            status_code(&err),
            render(PageView::Error(&err.to_string())),
        )
            .into_response(),
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict_json<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match run_pipeline(&state, multipart).await {
        Ok(prediction) => Json(prediction).into_response(),
        Err(err) => (
            status_code(&err),
            Json(ErrorBody {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}
