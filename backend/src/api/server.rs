//! Local HTTP server for the upload page.
//!
//! The server is stateless: a download re-runs the conversion with the same
//! form fields, which yields byte-identical tables.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                          |
//! |--------|-------------------------------|--------------------------------------|
//! | GET    | `/health`                     | Health check                         |
//! | POST   | `/api/convert`                | Convert an export, return summary    |
//! | POST   | `/api/download?artifact=NAME` | Convert an export, return one file   |
//! | GET    | `/api/logs`                   | SSE stream for real-time logs        |
//!
//! Both POST endpoints take a multipart form with `file` (CSV or
//! spreadsheet), `system`, `password` and optionally `emailDomain` and
//! `format` (`xlsx` or `csv`).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LOG_BROADCASTER;
use super::types::{empty_response, error_response, ConvertResponse};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::models::{OutputFormat, SourceSystem};
use crate::parser::DecodeOptions;
use crate::transform::pipeline::{convert_bytes, ConversionOutcome, ConversionRequest};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

type ApiError = (StatusCode, Json<Value>);

/// Start the HTTP server on the loopback interface
pub async fn start_server(port: u16) -> ServerResult<()> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let app = router().layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("🚀 Rosterload server running on http://localhost:{}", port);
    println!("   POST /api/convert  - Convert an academic export");
    println!("   POST /api/download - Download one converted file");
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");
    println!();
    println!("🔒 Files are processed locally and never leave this machine");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes without middleware
pub fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/convert", post(convert_upload))
        .route("/api/download", post(download_artifact))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Health check endpoint
async fn health() -> Json<Value> {
    let systems: Vec<Value> = SourceSystem::ALL
        .iter()
        .map(|s| json!({ "id": s, "name": s.display_name(), "available": s.is_available() }))
        .collect();

    Json(json!({
        "status": "ok",
        "service": "rosterload",
        "version": env!("CARGO_PKG_VERSION"),
        "systems": systems,
        "endpoints": {
            "convert": "POST /api/convert",
            "download": "POST /api/download?artifact=NAME",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Fields of the conversion form
#[derive(Debug, Default)]
struct ConvertForm {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    system: Option<String>,
    password: Option<String>,
    email_domain: Option<String>,
    format: Option<String>,
}

impl ConvertForm {
    async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = ConvertForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(|s| s.to_string());
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                    form.bytes = Some(bytes.to_vec());
                }
                "system" | "password" | "emailDomain" | "format" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                    match name.as_str() {
                        "system" => form.system = Some(text),
                        "password" => form.password = Some(text),
                        "format" => form.format = Some(text),
                        _ => form.email_domain = Some(text),
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Validate the form and build the request the engine needs.
    fn into_request(self) -> ServerResult<(Vec<u8>, ConversionRequest)> {
        let bytes = self
            .bytes
            .ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

        let system: SourceSystem = self
            .system
            .as_deref()
            .unwrap_or("lyceum")
            .parse()
            .map_err(ServerError::BadRequest)?;

        let password = self.password.unwrap_or_default();
        if password.trim().is_empty() {
            return Err(ServerError::BadRequest("A senha padrão é obrigatória.".into()));
        }

        let format: OutputFormat = match self.format.as_deref().map(str::trim) {
            None | Some("") => OutputFormat::default(),
            Some(value) => value.parse().map_err(ServerError::BadRequest)?,
        };

        let mut request = ConversionRequest::new(system, password).with_output_format(format);
        if let Some(domain) = self.email_domain.filter(|d| !d.trim().is_empty()) {
            request = request.with_email_domain(domain.trim());
        }
        Ok((bytes, request))
    }
}

fn api_error(err: ServerError) -> ApiError {
    let status = match &err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
        ServerError::Pipeline(p) if p.is_input_error() => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(p) if p.is_empty_result() => StatusCode::NOT_FOUND,
        ServerError::Pipeline(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match &err {
        ServerError::Pipeline(p) => p.to_string(),
        other => other.to_string(),
    };
    eprintln!("❌ {}", message);
    (status, Json(error_response(&message)))
}

async fn run_conversion(multipart: Multipart) -> ServerResult<ConversionOutcome> {
    let form = ConvertForm::read(multipart).await?;
    let file_name = form.file_name.clone().unwrap_or_else(|| "unknown".into());
    let (bytes, request) = form.into_request()?;

    println!("\n{}", "=".repeat(70));
    println!("📄 NEW UPLOAD: {} ({} bytes, {})", file_name, bytes.len(), request.system);
    println!("{}\n", "=".repeat(70));

    Ok(convert_bytes(&bytes, &request, &DecodeOptions::default())?)
}

/// Convert endpoint: summary, previews and artifact list
async fn convert_upload(multipart: Multipart) -> Result<Json<Value>, ApiError> {
    match run_conversion(multipart).await {
        Ok(outcome) => {
            let response = ConvertResponse::from(&outcome);
            serde_json::to_value(&response)
                .map(Json)
                .map_err(|e| api_error(ServerError::BadRequest(e.to_string())))
        }
        Err(ServerError::Pipeline(PipelineError::EmptyResult(reason))) => {
            Ok(Json(empty_response(&reason.to_string())))
        }
        Err(err) => Err(api_error(err)),
    }
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    artifact: String,
}

/// Download endpoint: the bytes of one artifact
async fn download_artifact(
    Query(query): Query<DownloadQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let outcome = run_conversion(multipart).await.map_err(api_error)?;

    let artifact = outcome
        .artifact(&query.artifact)
        .ok_or_else(|| api_error(ServerError::ArtifactNotFound(query.artifact.clone())))?;

    let headers = [
        (header::CONTENT_TYPE, artifact.mime_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.name()),
        ),
    ];
    Ok((headers, artifact.bytes().to_vec()).into_response())
}
