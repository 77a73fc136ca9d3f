use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use pet_policy_core::{
    ComparisonAnswer, CoverageChecklist, ExtractionError, IngestError, PdfUpload, PolicyRecord,
    PolicySummary,
};
use serde::{Deserialize, Serialize};

const MAX_POLICY_ID_LEN: usize = 128;
const MAX_QUESTION_CHARS: usize = 4_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CoverageCheckRequest {
    pub incident_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompareRequest {
    pub policy_id1: Option<String>,
    pub policy_id2: Option<String>,
    pub question: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    vector_store: &'static str,
}

pub(crate) async fn coverage_check_handler(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    payload: Result<Json<CoverageCheckRequest>, JsonRejection>,
) -> Result<Json<CoverageChecklist>, ApiError> {
    let Json(request) = payload?;
    let policy_id = validate_policy_id(&policy_id)?;
    let incident = required_text(request.incident_description, "incidentDescription")?;

    let checklist = state.assistant.coverage_check(policy_id, &incident).await?;
    Ok(Json(checklist))
}

pub(crate) async fn compare_handler(
    State(state): State<AppState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<ComparisonAnswer>, ApiError> {
    let Json(request) = payload?;
    let policy_id1 = required_text(request.policy_id1, "policyId1")?;
    let policy_id2 = required_text(request.policy_id2, "policyId2")?;
    let question = required_text(request.question, "question")?;
    validate_policy_id(&policy_id1)?;
    validate_policy_id(&policy_id2)?;

    let answer = state
        .assistant
        .compare(&policy_id1, &policy_id2, &question)
        .await?;
    Ok(Json(answer))
}

pub(crate) async fn upload_policy_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PolicyRecord>), ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("policy.pdf").to_string();
                let bytes = field.bytes().await?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("name") => {
                let value = field.text().await?;
                if !value.trim().is_empty() {
                    name = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::Validation("file is required".to_string()))?;
    if !bytes.starts_with(b"%PDF-") {
        return Err(ApiError::Ingest(IngestError::Extraction(
            ExtractionError::PdfParse("file is not a PDF document".to_string()),
        )));
    }

    let policy_id = uuid::Uuid::new_v4().to_string();
    let name = name.unwrap_or_else(|| {
        file_name
            .strip_suffix(".pdf")
            .or_else(|| file_name.strip_suffix(".PDF"))
            .unwrap_or(&file_name)
            .to_string()
    });

    let record = state
        .pipeline
        .ingest_pdf(PdfUpload {
            bytes,
            policy_id,
            name,
            file_name,
        })
        .await?;
    state.registry.insert(record.clone()).await;

    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn list_policies_handler(State(state): State<AppState>) -> Json<Vec<PolicyRecord>> {
    Json(state.registry.list().await)
}

pub(crate) async fn get_policy_handler(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
) -> Result<Json<PolicyRecord>, ApiError> {
    state
        .registry
        .get(&policy_id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound(policy_id))
}

pub(crate) async fn put_summary_handler(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    payload: Result<Json<PolicySummary>, JsonRejection>,
) -> Result<Json<PolicyRecord>, ApiError> {
    let Json(summary) = payload?;
    let problems = summary.validate();
    if !problems.is_empty() {
        return Err(ApiError::Validation(problems.join("; ")));
    }

    state
        .registry
        .set_summary(&policy_id, summary)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound(policy_id))
}

pub(crate) async fn summary_schema_handler() -> Json<PolicySummary> {
    Json(PolicySummary::example())
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let vector_store = match state.assistant.index().heartbeat().await {
        Ok(()) => "ok",
        Err(error) => {
            tracing::warn!(%error, "vector store heartbeat failed");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: if vector_store == "ok" { "ok" } else { "degraded" },
        uptime_secs: state.started_at.elapsed().as_secs(),
        vector_store,
    })
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    let value = value.unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {MAX_QUESTION_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_policy_id(policy_id: &str) -> Result<&str, ApiError> {
    let valid = !policy_id.is_empty()
        && policy_id.len() <= MAX_POLICY_ID_LEN
        && policy_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if valid {
        Ok(policy_id)
    } else {
        Err(ApiError::Validation(format!("invalid policy id {policy_id:?}")))
    }
}
