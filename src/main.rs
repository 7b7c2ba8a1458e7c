//! Rota converter - chemotherapy rota to EPMA build-file conversion server.
//!
//! Two-step workflow: upload a rota (PDF or the EPMA info-page HTML) to
//! `/extract` and get a config YAML back for human review; upload the
//! reviewed YAML to `/generate` and get the EPMA TXT build script and the
//! checking DOCX written to the output directory.

mod acquire;
mod assemble;
mod classify;
mod docx_gen;
mod error;
mod fields;
mod html;
mod injectable;
mod model;
mod ocr;
mod txt_gen;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acquire::InputFormat;
use model::RotaConfig;
use ocr::OcrProvider;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    output_dir: PathBuf,
    ocr: Option<Arc<dyn OcrProvider>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rota_converter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let output_dir =
        PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "output".to_string()));
    std::fs::create_dir_all(&output_dir)?;
    info!("Output directory: {}", output_dir.display());

    let ocr = ocr::sidecar::SidecarProvider::from_env(reqwest::Client::new())
        .map(|p| Arc::new(p) as Arc<dyn OcrProvider>);
    match &ocr {
        Some(p) => info!("OCR fallback enabled via {} provider", p.name()),
        None => info!("OCR fallback disabled (OCR_SIDECAR_URL not set)"),
    }

    let state = AppState { output_dir, ocr };

    let app = Router::new()
        .route("/health", get(health))
        .route("/extract", post(extract_rota))
        .route("/generate", post(generate_outputs))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // 50MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);
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

/// Read the single "file" field from a multipart upload.
async fn read_upload(
    multipart: &mut Multipart,
) -> Result<(String, Vec<u8>), (StatusCode, String)> {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("document").to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e)))?
                .to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }
    Ok((filename, file_data))
}

#[derive(Serialize)]
struct ExtractResponse {
    config_file: String,
    config: RotaConfig,
}

/// Upload a rota document and get the review config back.
async fn extract_rota(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, (StatusCode, String)> {
    let (filename, file_data) = read_upload(&mut multipart).await?;
    info!("Received file: {} ({} bytes)", filename, file_data.len());

    let format = acquire::detect_format(&filename)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let config = match format {
        InputFormat::Html => {
            let html = acquire::decode_html(&file_data);
            assemble::assemble_html(&html)
        }
        InputFormat::Pdf => {
            let text = acquire::pdf_text_with_fallback(&file_data, &filename, state.ocr.as_deref())
                .await
                .map_err(|e| {
                    error!("PDF extraction failed: {}", e);
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        format!("Could not extract text from document: {}", e),
                    )
                })?;
            assemble::assemble_pdf(&text)
        }
    };

    let stem = std::path::Path::new(&filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let yaml_name = format!("{stem}_config.yaml");
    let yaml_path = state.output_dir.join(&yaml_name);

    let yaml = config
        .to_yaml()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tokio::fs::write(&yaml_path, yaml)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!("Config written: {}", yaml_path.display());
    Ok(Json(ExtractResponse {
        config_file: yaml_name,
        config,
    }))
}

#[derive(Serialize)]
struct GenerateResponse {
    txt_file: String,
    docx_file: String,
}

/// Upload a reviewed config YAML and generate the two output files.
async fn generate_outputs(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, (StatusCode, String)> {
    let (filename, file_data) = read_upload(&mut multipart).await?;
    info!("Received config: {} ({} bytes)", filename, file_data.len());

    let yaml = String::from_utf8_lossy(&file_data).to_string();
    let config = RotaConfig::from_yaml(&yaml)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid config YAML: {}", e)))?;

    // Sentinel fields must be filled in before generation
    if let Err(e) = config.validate() {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()));
    }
    if config.templates.is_empty() {
        warn!("config has no drug templates; outputs will need manual completion");
    }
    if config.blood_tests.is_empty() {
        warn!("config has no blood tests; proceed rules will be empty");
    }

    let txt_name = format!("#{}{}.txt", config.ticket_number, config.drug_prefix);
    let txt_content = txt_gen::generate_txt(&config);
    tokio::fs::write(state.output_dir.join(&txt_name), txt_content)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    info!("TXT generated: {}", txt_name);

    let docx_name = format!("{} {}.docx", config.document_code, config.drug_full_name);
    let docx_data = docx_gen::docx_bytes(&config)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tokio::fs::write(state.output_dir.join(&docx_name), docx_data)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    info!("DOCX generated: {}", docx_name);

    Ok(Json(GenerateResponse {
        txt_file: txt_name,
        docx_file: docx_name,
    }))
}
