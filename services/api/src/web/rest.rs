//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use excuse_core::ports::{ArtifactKind, PortError};
use excuse_core::{
    DocumentType, ExcuseFilter, ExcuseRequest, GeneratedExcuse, Language, ProofDocument,
    ProofRequest, VoiceClip,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

/// URL prefixes under which the artifact directories are served.
pub const AUDIO_URL_PREFIX: &str = "/static/audio";
pub const PROOF_URL_PREFIX: &str = "/static/proofs";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_excuse_handler,
        list_excuses_handler,
        get_excuse_handler,
        delete_excuse_handler,
        toggle_favorite_handler,
        set_favorite_handler,
        create_proof_handler,
        list_proofs_handler,
        delete_proof_handler,
        create_voice_handler,
        list_voice_clips_handler,
        template_fields_handler,
        health_handler,
    ),
    components(
        schemas(
            GenerateExcusePayload,
            ExcuseResponse,
            ExcuseListResponse,
            SetFavoritePayload,
            CreateProofPayload,
            ProofResponse,
            CreateVoicePayload,
            VoiceClipResponse,
            TemplateFieldsResponse,
            HealthResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Excuse Generator API", description = "Generate, score, keep and dress up excuses.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// Form values for a new excuse. Codes are validated against their closed sets.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateExcusePayload {
    #[schema(example = "work")]
    pub scenario: String,
    #[schema(example = "apologetic")]
    pub tone: String,
    #[schema(example = "en")]
    pub language: String,
    #[serde(default)]
    #[schema(example = "Missed the Monday stand-up")]
    pub extra_context: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListExcusesQuery {
    /// Only favorites (`true`) or only non-favorites (`false`).
    pub favorite: Option<bool>,
    /// Language code filter.
    pub language: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Proof request. `language` defaults to the excuse's own language.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProofPayload {
    #[schema(example = "email")]
    pub document_type: String,
    pub language: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Explicit favorite flag; repeating the same value changes nothing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetFavoritePayload {
    pub favorite: bool,
}

/// Voice request. `language` defaults to the excuse's own language.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateVoicePayload {
    pub language: Option<String>,
}

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct ExcuseResponse {
    pub id: Uuid,
    pub scenario: String,
    pub tone: String,
    pub language: String,
    pub extra_context: String,
    pub text: String,
    pub believability_score: u8,
    pub language_confirmed: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

impl From<GeneratedExcuse> for ExcuseResponse {
    fn from(excuse: GeneratedExcuse) -> Self {
        Self {
            id: excuse.id,
            scenario: excuse.scenario.to_string(),
            tone: excuse.tone.to_string(),
            language: excuse.language.to_string(),
            extra_context: excuse.extra_context,
            text: excuse.text,
            believability_score: excuse.believability_score,
            language_confirmed: excuse.language_confirmed,
            is_favorite: excuse.is_favorite,
            created_at: excuse.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExcuseListResponse {
    pub items: Vec<ExcuseResponse>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProofResponse {
    pub id: Uuid,
    pub excuse_id: Uuid,
    pub document_type: String,
    pub language: String,
    pub rendered_text: String,
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ProofDocument> for ProofResponse {
    fn from(proof: ProofDocument) -> Self {
        Self {
            id: proof.id,
            excuse_id: proof.excuse_id,
            document_type: proof.document_type.to_string(),
            language: proof.language.to_string(),
            rendered_text: proof.rendered_text,
            download_url: proof
                .artifact_path
                .as_deref()
                .and_then(|path| artifact_url(PROOF_URL_PREFIX, path)),
            created_at: proof.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoiceClipResponse {
    pub id: Uuid,
    pub excuse_id: Uuid,
    pub language: String,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<VoiceClip> for VoiceClipResponse {
    fn from(clip: VoiceClip) -> Self {
        Self {
            id: clip.id,
            excuse_id: clip.excuse_id,
            language: clip.language.to_string(),
            audio_url: artifact_url(AUDIO_URL_PREFIX, &clip.audio_artifact_path),
            created_at: clip.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateFieldsResponse {
    pub document_type: String,
    pub language: String,
    /// Fields the caller has to supply in `CreateProofPayload::fields`.
    pub required_fields: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Removes a file whose row could not be stored.
async fn discard_artifact(app_state: &AppState, path: &str) {
    if let Err(e) = app_state.artifacts.remove(path).await {
        warn!(path, "Failed to remove orphaned artifact: {}", e);
    }
}

/// Maps a stored artifact path to the URL it is served under.
fn artifact_url(prefix: &str, path: &str) -> Option<String> {
    std::path::Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| format!("{}/{}", prefix, name))
}

//=========================================================================================
// Excuse Handlers
//=========================================================================================

/// Generate, score and store a new excuse.
#[utoipa::path(
    post,
    path = "/api/excuses",
    request_body = GenerateExcusePayload,
    responses(
        (status = 201, description = "Excuse generated", body = ExcuseResponse),
        (status = 400, description = "Unknown scenario, tone or language", body = ErrorBody),
        (status = 429, description = "Upstream rate limit, see Retry-After", body = ErrorBody),
        (status = 502, description = "The model returned nothing usable", body = ErrorBody),
        (status = 503, description = "Text generation unavailable", body = ErrorBody)
    )
)]
pub async fn generate_excuse_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GenerateExcusePayload>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate before touching the generator so bad input is always a 400.
    let request = ExcuseRequest::parse(
        &payload.scenario,
        &payload.tone,
        &payload.language,
        &payload.extra_context,
    )?;
    let excuse = app_state.generator()?.generate(&request).await?;
    Ok((StatusCode::CREATED, Json(ExcuseResponse::from(excuse))))
}

/// List stored excuses, newest first.
#[utoipa::path(
    get,
    path = "/api/excuses",
    params(ListExcusesQuery),
    responses(
        (status = 200, description = "One page of history", body = ExcuseListResponse),
        (status = 400, description = "Unknown language filter", body = ErrorBody)
    )
)]
pub async fn list_excuses_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListExcusesQuery>,
) -> Result<Json<ExcuseListResponse>, ApiError> {
    let defaults = ExcuseFilter::default();
    let filter = ExcuseFilter {
        favorite: query.favorite,
        language: query
            .language
            .as_deref()
            .map(str::parse::<Language>)
            .transpose()?,
        page: query.page.unwrap_or(defaults.page).max(1),
        per_page: query
            .per_page
            .unwrap_or(defaults.per_page)
            .clamp(1, ExcuseFilter::MAX_PER_PAGE),
    };

    let page = app_state.history.list_excuses(&filter).await?;
    let pages = page.pages();
    Ok(Json(ExcuseListResponse {
        items: page.items.into_iter().map(ExcuseResponse::from).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        pages,
    }))
}

#[utoipa::path(
    get,
    path = "/api/excuses/{id}",
    params(("id" = Uuid, Path, description = "Excuse id")),
    responses(
        (status = 200, description = "The excuse", body = ExcuseResponse),
        (status = 404, description = "No such excuse", body = ErrorBody)
    )
)]
pub async fn get_excuse_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExcuseResponse>, ApiError> {
    let excuse = app_state.history.get_excuse(id).await?;
    Ok(Json(excuse.into()))
}

/// Delete an excuse together with its proofs and voice clips.
#[utoipa::path(
    delete,
    path = "/api/excuses/{id}",
    params(("id" = Uuid, Path, description = "Excuse id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such excuse", body = ErrorBody)
    )
)]
pub async fn delete_excuse_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state.history.delete_excuse(id).await?;
    info!(excuse_id = %id, "Excuse deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Flip the favorite flag and return the updated excuse.
#[utoipa::path(
    post,
    path = "/api/excuses/{id}/favorite",
    params(("id" = Uuid, Path, description = "Excuse id")),
    responses(
        (status = 200, description = "Updated excuse", body = ExcuseResponse),
        (status = 404, description = "No such excuse", body = ErrorBody)
    )
)]
pub async fn toggle_favorite_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExcuseResponse>, ApiError> {
    let excuse = app_state.history.toggle_favorite(id).await?;
    Ok(Json(excuse.into()))
}

#[utoipa::path(
    put,
    path = "/api/excuses/{id}/favorite",
    params(("id" = Uuid, Path, description = "Excuse id")),
    request_body = SetFavoritePayload,
    responses(
        (status = 200, description = "Updated excuse", body = ExcuseResponse),
        (status = 404, description = "No such excuse", body = ErrorBody)
    )
)]
pub async fn set_favorite_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetFavoritePayload>,
) -> Result<Json<ExcuseResponse>, ApiError> {
    let excuse = app_state.history.set_favorite(id, payload.favorite).await?;
    Ok(Json(excuse.into()))
}

//=========================================================================================
// Proof Handlers
//=========================================================================================

/// Render a supporting document for an excuse and keep it.
#[utoipa::path(
    post,
    path = "/api/excuses/{id}/proofs",
    params(("id" = Uuid, Path, description = "Excuse id")),
    request_body = CreateProofPayload,
    responses(
        (status = 201, description = "Proof rendered and stored", body = ProofResponse),
        (status = 400, description = "Unknown document type or language", body = ErrorBody),
        (status = 404, description = "No such excuse", body = ErrorBody),
        (status = 422, description = "A required field is missing or no template exists", body = ErrorBody)
    )
)]
pub async fn create_proof_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateProofPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let excuse = app_state.history.get_excuse(id).await?;
    let language = payload
        .language
        .unwrap_or_else(|| excuse.language.to_string());
    let request = ProofRequest::parse(&payload.document_type, &language, payload.fields)?;

    let rendered = app_state.proofs.render(&excuse, &request)?;
    let path = app_state
        .artifacts
        .write(
            ArtifactKind::Proof,
            &rendered.file_name(id),
            rendered.text.as_bytes(),
        )
        .await?;
    let document = rendered.into_document(id, Some(path));
    if let Err(e) = app_state.history.save_proof(&document).await {
        if let Some(path) = &document.artifact_path {
            discard_artifact(&app_state, path).await;
        }
        return Err(e.into());
    }
    info!(
        excuse_id = %id,
        proof_id = %document.id,
        document_type = %document.document_type,
        "Proof document stored"
    );

    Ok((StatusCode::CREATED, Json(ProofResponse::from(document))))
}

#[utoipa::path(
    get,
    path = "/api/excuses/{id}/proofs",
    params(("id" = Uuid, Path, description = "Excuse id")),
    responses(
        (status = 200, description = "Proofs for the excuse, oldest first", body = [ProofResponse]),
        (status = 404, description = "No such excuse", body = ErrorBody)
    )
)]
pub async fn list_proofs_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProofResponse>>, ApiError> {
    app_state.history.get_excuse(id).await?;
    let proofs = app_state.history.list_proofs(id).await?;
    Ok(Json(proofs.into_iter().map(ProofResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/proofs/{id}",
    params(("id" = Uuid, Path, description = "Proof id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such proof", body = ErrorBody)
    )
)]
pub async fn delete_proof_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state.history.delete_proof(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fields a caller has to supply for a document type and language.
#[utoipa::path(
    get,
    path = "/api/templates/{document_type}/{language}",
    params(
        ("document_type" = String, Path, description = "email, receipt or medical_note"),
        ("language" = String, Path, description = "Language code")
    ),
    responses(
        (status = 200, description = "Required fields", body = TemplateFieldsResponse),
        (status = 400, description = "Unknown document type or language", body = ErrorBody),
        (status = 422, description = "No template for the pair", body = ErrorBody)
    )
)]
pub async fn template_fields_handler(
    State(app_state): State<Arc<AppState>>,
    Path((document_type, language)): Path<(String, String)>,
) -> Result<Json<TemplateFieldsResponse>, ApiError> {
    let document_type: DocumentType = document_type.parse()?;
    let language: Language = language.parse()?;
    let required_fields = app_state.proofs.required_fields(document_type, language)?;
    Ok(Json(TemplateFieldsResponse {
        document_type: document_type.to_string(),
        language: language.to_string(),
        required_fields,
    }))
}

//=========================================================================================
// Voice Handlers
//=========================================================================================

/// Read an excuse aloud and keep the audio.
#[utoipa::path(
    post,
    path = "/api/excuses/{id}/voice",
    params(("id" = Uuid, Path, description = "Excuse id")),
    request_body = CreateVoicePayload,
    responses(
        (status = 201, description = "Clip synthesized and stored", body = VoiceClipResponse),
        (status = 404, description = "No such excuse", body = ErrorBody),
        (status = 422, description = "No voice for the language", body = ErrorBody),
        (status = 503, description = "Speech synthesis unavailable", body = ErrorBody)
    )
)]
pub async fn create_voice_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // The body is optional; an empty POST reads the excuse in its own language.
    let payload: CreateVoicePayload = if body.iter().all(u8::is_ascii_whitespace) {
        CreateVoicePayload::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| PortError::InvalidInput(format!("invalid voice request: {}", e)))?
    };
    let excuse = app_state.history.get_excuse(id).await?;
    let language = payload
        .language
        .unwrap_or_else(|| excuse.language.to_string());

    let clip = app_state
        .voice()?
        .render(excuse.id, &excuse.text, &language)
        .await?;
    if let Err(e) = app_state.history.save_voice_clip(&clip).await {
        discard_artifact(&app_state, &clip.audio_artifact_path).await;
        return Err(e.into());
    }

    Ok((StatusCode::CREATED, Json(VoiceClipResponse::from(clip))))
}

#[utoipa::path(
    get,
    path = "/api/excuses/{id}/voice",
    params(("id" = Uuid, Path, description = "Excuse id")),
    responses(
        (status = 200, description = "Clips for the excuse, oldest first", body = [VoiceClipResponse]),
        (status = 404, description = "No such excuse", body = ErrorBody)
    )
)]
pub async fn list_voice_clips_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<VoiceClipResponse>>, ApiError> {
    app_state.history.get_excuse(id).await?;
    let clips = app_state.history.list_voice_clips(id).await?;
    Ok(Json(clips.into_iter().map(VoiceClipResponse::from).collect()))
}

//=========================================================================================
// Health
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
