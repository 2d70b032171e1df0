//! Vickers Extractor - turns photos of hardness observation sheets into filled MTC workbooks.

mod config;
mod error;
mod layout;
mod markdown_parser;
mod observation;
mod ocr;
mod openrouter;
mod pipeline;
mod sheet_writer;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use config::{AppConfig, ExtractionConfig};
use error::PipelineError;
use observation::{ExtractionResult, ParseStats};
use ocr::vision::VisionTranscriber;
use ocr::SheetImage;
use openrouter::OpenRouterClient;
use pipeline::ExtractionPipeline;
use sheet_writer::SheetWriter;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const DOWNLOAD_NAME: &str = "Vickers_Hardness_MTC.xlsx";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<ExtractionPipeline>,
    config: Arc<ExtractionConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "vickers_extractor=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!(
        "Config: {} (model={}, template={:?}, output={:?}, strict_groups={})",
        config.extraction.name,
        config.model,
        config.template_path,
        config.output_dir,
        config.strict_groups
    );

    if !config.template_path.exists() {
        warn!(
            "Template {:?} not found; /extract will fail until it is in place",
            config.template_path
        );
    }

    let client = OpenRouterClient::new(config.api_key.clone()).with_model(config.model.clone());
    let transcriber = VisionTranscriber::new(client, config.extraction.prompt.clone());
    let writer = SheetWriter::new(config.extraction.layout.clone())?
        .with_strict_groups(config.strict_groups);

    let state = AppState {
        pipeline: Arc::new(ExtractionPipeline::new(
            Arc::new(transcriber),
            writer,
            config.template_path.clone(),
            config.output_dir.clone(),
        )),
        config: Arc::new(config.extraction.clone()),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/layout", get(get_layout))
        .route("/parse", post(parse_document))
        .route("/extract", post(extract_sheet))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024)) // 25MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Active prompt and template layout.
async fn get_layout(State(state): State<AppState>) -> Json<ExtractionConfig> {
    Json((*state.config).clone())
}

#[derive(serde::Serialize)]
struct ParseResponse {
    result: ExtractionResult,
    stats: ParseStats,
}

/// Parse a markdown transcription without calling the model or writing a workbook.
async fn parse_document(body: String) -> Json<ParseResponse> {
    let (result, stats) = markdown_parser::parse_markdown_with_stats(&body);
    Json(ParseResponse { result, stats })
}

/// Upload a sheet image and download the populated workbook.
async fn extract_sheet(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("sheet").to_string();
            file_data = field.bytes().await.map_err(|e| {
                (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
            })?.to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }

    info!("Received image: {} ({} bytes)", filename, file_data.len());

    let image = SheetImage::from_upload(filename, &file_data).map_err(error_response)?;
    let report = state.pipeline.run(&image).await.map_err(error_response)?;

    let bytes = pipeline::take_output(&report).await.map_err(error_response)?;

    info!(
        "[{}] Extraction complete: {} samples, {} bytes",
        report.id,
        report.result.samples.len(),
        bytes.len()
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, XLSX_MIME)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", DOWNLOAD_NAME),
        )
        .header("x-extraction-id", report.id.as_str())
        .header("x-samples", report.result.samples.len().to_string())
        .header("x-dropped-rows", report.stats.rows_dropped.to_string())
        .header("x-content-sha256", report.content_hash.as_str())
        .body(Body::from(bytes))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// One status and message per failed request.
fn error_response(e: PipelineError) -> (StatusCode, String) {
    error!("Extraction failed: {}", e);
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if e.is_upstream_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, e.to_string())
}
