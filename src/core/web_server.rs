//! HTTP front end for the batch pipeline.
//!
//! - `GET /`          - upload form
//! - `POST /download` - fetch the submitted URLs and stream back one ZIP
//! - `GET /health`    - liveness with uptime
//! - `GET /metrics`   - Prometheus text exposition

use axum::{
    body::Body,
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

use crate::core::error::AppError;
use crate::core::metrics;
use crate::core::types::parse_source_list;
use crate::download::pipeline::{BatchError, BatchFetchPipeline};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>tapedeck</title>
<style>
body{font-family:system-ui,-apple-system,sans-serif;max-width:40rem;margin:3rem auto;padding:0 1rem;color:#222}
textarea{width:100%;min-height:8rem;font:inherit;padding:.5rem;box-sizing:border-box}
button{margin-top:.75rem;padding:.5rem 1.25rem;font:inherit;cursor:pointer}
small{color:#666}
</style>
</head>
<body>
<h1>tapedeck</h1>
<form action="/download" method="post">
<label for="urls">Video URLs, separated by commas</label>
<textarea id="urls" name="urls" placeholder="https://www.youtube.com/watch?v=..., https://youtu.be/..."></textarea>
<button type="submit">Download MP3s</button>
</form>
<p><small>Every URL is converted to MP3; the results come back as one ZIP archive.</small></p>
</body>
</html>
"#;

/// Shared state for the web server.
#[derive(Clone)]
pub struct WebState {
    pipeline: Arc<BatchFetchPipeline>,
    start_time: Instant,
}

impl WebState {
    pub fn new(pipeline: Arc<BatchFetchPipeline>) -> Self {
        Self {
            pipeline,
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadForm {
    urls: Option<String>,
}

/// Error response: status plus a plain-text body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(e: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("An error occurred: {}", e),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::EmptyInput => Self {
                status: StatusCode::BAD_REQUEST,
                message: e.to_string(),
            },
            BatchError::NoValidResults => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
            },
            other => Self::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Router with every route bound to `state`.
pub fn build_router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/download", post(download_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve until Ctrl+C.
pub async fn start_web_server(addr: SocketAddr, state: WebState) -> Result<(), AppError> {
    let app = build_router(state);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /          - Upload form");
    log::info!("  /download  - Batch download (POST, form field `urls`)");
    log::info!("  /health    - Health check");
    log::info!("  /metrics   - Prometheus metrics");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            log::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// POST /download: runs one batch and streams the archive.
///
/// The job directory travels with the response body and is removed once the
/// body has been sent or dropped.
async fn download_handler(
    State(state): State<WebState>,
    form: Result<Form<DownloadForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let raw = match form {
        Ok(Form(DownloadForm { urls: Some(urls) })) => urls,
        Ok(_) => return Err(BatchError::EmptyInput.into()),
        Err(rejection) => {
            log::warn!("Rejected download form: {}", rejection);
            return Err(BatchError::EmptyInput.into());
        }
    };

    let identifiers = parse_source_list(&raw);
    log::info!("Download request with {} URL(s)", identifiers.len());

    let batch = state.pipeline.run(&identifiers).await?;
    let (artifact, job) = batch.into_parts();

    let file = tokio::fs::File::open(&artifact.path).await.map_err(ApiError::internal)?;
    let size = file.metadata().await.map_err(ApiError::internal)?.len();

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _job = &job;
        chunk
    });

    let disposition = format!("attachment; filename=\"{}\"", state.pipeline.archive_name());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from_stream(stream))
        .map_err(ApiError::internal)
}

async fn health_handler(State(state): State<WebState>) -> impl IntoResponse {
    let pool = state.pipeline.pool();
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "workers": pool.size(),
        "workers_busy": pool.busy(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
