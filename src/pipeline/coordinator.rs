//! Per-request generation orchestration: validate, select codes, resolve
//! the seed, invoke the LLM, audit, respond. The audit write is the
//! commit point; a generation is not observable until its record exists.
//! Failures after decode and auth also produce an audit record, with
//! status `error` and the failure stringified.

use serde_json::Value;
use thiserror::Error;

use crate::db::repository::audit;
use crate::db::DatabaseError;
use crate::models::{
    CdtAddOn, CdtCodeEntry, DocumentKind, GenerationRecord, GenerationStatus,
    InsuranceMetadata, InsuranceSummaryOutput, InsuranceSummaryRequest, InsuranceSummaryResponse,
    NewGeneration, TreatmentCdtCodes, TreatmentMetadata, TreatmentSummaryOutput,
    TreatmentSummaryRequest, TreatmentSummaryResponse,
};
use crate::pipeline::llm::{ChatRequest, LlmError};
use crate::pipeline::selector::{self, CodeSelection, SelectionError};
use crate::pipeline::{prompts, schema_registry};
use crate::redact;
use crate::settings::Settings;
use crate::state::{AppState, StateError};
use crate::text::normalize_to_ascii;

const TREATMENT_TEMPERATURE: f64 = 0.7;
const TREATMENT_MAX_TOKENS: u32 = 2000;
// Lower temperature for more consistent, conservative output.
const INSURANCE_TEMPERATURE: f64 = 0.5;
const INSURANCE_MAX_TOKENS: u32 = 1500;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("previous_version_uuid is required when is_regeneration is true")]
    RegenerationMissingParent,

    #[error("Previous generation {0} not found")]
    ParentNotFound(String),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Usage accounting threaded from the LLM call into audit and response.
struct Usage {
    tokens_used: i64,
    generation_time_ms: i64,
    seed: i64,
}

// ── Treatment summary ───────────────────────────────────────

struct TreatmentOutcome {
    output: TreatmentSummaryOutput,
    selection: Option<CodeSelection>,
    usage: Usage,
    parent: Option<String>,
}

pub async fn generate_treatment_summary(
    state: &AppState,
    user_id: &str,
    request: &TreatmentSummaryRequest,
) -> Result<TreatmentSummaryResponse, GenerationError> {
    let kind = DocumentKind::TreatmentSummary;
    let input_json = serde_json::to_value(request)?;

    let mut resolved_seed = None;
    match treatment_pipeline(state, user_id, request, &mut resolved_seed).await {
        Ok(outcome) => {
            let output_json = serde_json::to_value(&outcome.output)?;
            let record = write_success_audit(
                state,
                user_id,
                kind,
                &input_json,
                &output_json,
                &outcome.usage,
                request.is_regeneration,
                outcome.parent.clone(),
            )?;
            tracing::info!(
                user_id,
                document_kind = %kind,
                generation_id = %record.id,
                seed = outcome.usage.seed,
                is_regenerated = request.is_regeneration,
                "Generated treatment summary"
            );
            Ok(TreatmentSummaryResponse {
                success: true,
                document: outcome.output,
                cdt_codes: outcome.selection.map(treatment_cdt_block),
                metadata: TreatmentMetadata {
                    tokens_used: outcome.usage.tokens_used,
                    generation_time_ms: outcome.usage.generation_time_ms,
                    audience: request.audience,
                    tone: request.tone,
                    seed: outcome.usage.seed,
                    document_version: schema_registry::document_version(kind).to_string(),
                },
                uuid: record.id,
                is_regenerated: request.is_regeneration,
                previous_version_uuid: outcome.parent,
                seed: outcome.usage.seed,
            })
        }
        Err(error) => {
            write_error_audit(
                state,
                user_id,
                kind,
                &input_json,
                &error,
                resolved_seed,
                request.is_regeneration,
                request.previous_version_uuid.clone(),
            );
            Err(error)
        }
    }
}

async fn treatment_pipeline(
    state: &AppState,
    user_id: &str,
    request: &TreatmentSummaryRequest,
    resolved_seed: &mut Option<i64>,
) -> Result<TreatmentOutcome, GenerationError> {
    let kind = DocumentKind::TreatmentSummary;

    // Code selection is skipped when no tier is supplied; with a tier it
    // runs before the LLM call so bad inputs fail cheaply.
    let selection = match request.tier {
        Some(tier) => {
            let conn = state.db()?;
            Some(selector::select_treatment_codes(
                &conn,
                tier,
                request.patient_age,
                None,
                None,
            )?)
        }
        None => None,
    };

    let (seed, parent) = {
        let conn = state.db()?;
        resolve_seed(
            &conn,
            &state.settings,
            kind,
            user_id,
            request.is_regeneration,
            request.previous_version_uuid.as_deref(),
        )?
    };
    *resolved_seed = Some(seed);

    let outcome = state
        .llm
        .complete(ChatRequest {
            system_prompt: prompts::TREATMENT_SUMMARY_SYSTEM_PROMPT.to_string(),
            user_prompt: prompts::build_treatment_user_prompt(request),
            model: state.settings.openai_model.clone(),
            temperature: TREATMENT_TEMPERATURE,
            max_tokens: TREATMENT_MAX_TOKENS,
            seed,
            schema_name: schema_registry::schema_name(kind).to_string(),
            schema: schema_registry::output_schema(kind),
        })
        .await?;

    let output = parse_treatment_output(&outcome.content)?;

    Ok(TreatmentOutcome {
        output,
        selection,
        usage: Usage {
            tokens_used: outcome.tokens_used,
            generation_time_ms: outcome.elapsed_ms,
            seed,
        },
        parent,
    })
}

fn parse_treatment_output(content: &str) -> Result<TreatmentSummaryOutput, GenerationError> {
    let parsed: TreatmentSummaryOutput = serde_json::from_str(content).map_err(|e| {
        LlmError::CallFailed(format!("response did not conform to the output schema: {e}"))
    })?;
    let title = normalize_to_ascii(parsed.title.trim());
    let summary = normalize_to_ascii(parsed.summary.trim());
    if title.is_empty() || summary.is_empty() {
        return Err(LlmError::CallFailed(
            "output schema requires non-empty title and summary".into(),
        )
        .into());
    }
    Ok(TreatmentSummaryOutput { title, summary })
}

fn treatment_cdt_block(selection: CodeSelection) -> TreatmentCdtCodes {
    TreatmentCdtCodes {
        primary_code: selection.primary_code,
        primary_description: selection.primary_description,
        suggested_add_ons: selection
            .add_ons
            .into_iter()
            .map(|a| CdtAddOn {
                code: a.code,
                description: a.description,
            })
            .collect(),
        notes: selection.notes,
    }
}

// ── Insurance summary ───────────────────────────────────────

struct InsuranceOutcome {
    output: InsuranceSummaryOutput,
    selection: CodeSelection,
    usage: Usage,
    parent: Option<String>,
}

pub async fn generate_insurance_summary(
    state: &AppState,
    user_id: &str,
    request: &InsuranceSummaryRequest,
) -> Result<InsuranceSummaryResponse, GenerationError> {
    let kind = DocumentKind::InsuranceSummary;
    let input_json = serde_json::to_value(request)?;

    let mut resolved_seed = None;
    match insurance_pipeline(state, user_id, request, &mut resolved_seed).await {
        Ok(outcome) => {
            let output_json = serde_json::to_value(&outcome.output)?;
            let record = write_success_audit(
                state,
                user_id,
                kind,
                &input_json,
                &output_json,
                &outcome.usage,
                request.is_regeneration,
                outcome.parent.clone(),
            )?;
            tracing::info!(
                user_id,
                document_kind = %kind,
                generation_id = %record.id,
                seed = outcome.usage.seed,
                is_regenerated = request.is_regeneration,
                "Generated insurance summary"
            );
            Ok(InsuranceSummaryResponse {
                success: true,
                document: outcome.output,
                cdt_codes: insurance_cdt_entries(&outcome.selection),
                metadata: InsuranceMetadata {
                    tokens_used: outcome.usage.tokens_used,
                    generation_time_ms: outcome.usage.generation_time_ms,
                    tier: request.tier,
                    age_group: request.age_group,
                    seed: outcome.usage.seed,
                    document_version: schema_registry::document_version(kind).to_string(),
                    cdt_notes: outcome.selection.notes,
                },
                uuid: record.id,
                is_regenerated: request.is_regeneration,
                previous_version_uuid: outcome.parent,
                seed: outcome.usage.seed,
            })
        }
        Err(error) => {
            write_error_audit(
                state,
                user_id,
                kind,
                &input_json,
                &error,
                resolved_seed,
                request.is_regeneration,
                request.previous_version_uuid.clone(),
            );
            Err(error)
        }
    }
}

async fn insurance_pipeline(
    state: &AppState,
    user_id: &str,
    request: &InsuranceSummaryRequest,
    resolved_seed: &mut Option<i64>,
) -> Result<InsuranceOutcome, GenerationError> {
    let kind = DocumentKind::InsuranceSummary;

    let selection = {
        let conn = state.db()?;
        selector::select_insurance_codes(
            &conn,
            request.tier,
            request.age_group,
            &request.diagnostic_assets,
            request.retainers_included,
        )?
    };

    let (seed, parent) = {
        let conn = state.db()?;
        resolve_seed(
            &conn,
            &state.settings,
            kind,
            user_id,
            request.is_regeneration,
            request.previous_version_uuid.as_deref(),
        )?
    };
    *resolved_seed = Some(seed);

    let outcome = state
        .llm
        .complete(ChatRequest {
            system_prompt: prompts::INSURANCE_SUMMARY_SYSTEM_PROMPT.to_string(),
            user_prompt: prompts::build_insurance_user_prompt(request),
            model: state.settings.openai_model.clone(),
            temperature: INSURANCE_TEMPERATURE,
            max_tokens: INSURANCE_MAX_TOKENS,
            seed,
            schema_name: schema_registry::schema_name(kind).to_string(),
            schema: schema_registry::output_schema(kind),
        })
        .await?;

    let output = parse_insurance_output(&outcome.content)?;

    Ok(InsuranceOutcome {
        output,
        selection,
        usage: Usage {
            tokens_used: outcome.tokens_used,
            generation_time_ms: outcome.elapsed_ms,
            seed,
        },
        parent,
    })
}

fn parse_insurance_output(content: &str) -> Result<InsuranceSummaryOutput, GenerationError> {
    #[derive(serde::Deserialize)]
    struct RawInsuranceOutput {
        insurance_summary: String,
    }

    let parsed: RawInsuranceOutput = serde_json::from_str(content).map_err(|e| {
        LlmError::CallFailed(format!("response did not conform to the output schema: {e}"))
    })?;
    let summary = normalize_to_ascii(parsed.insurance_summary.trim());
    if summary.is_empty() {
        return Err(
            LlmError::CallFailed("output schema requires a non-empty insurance_summary".into())
                .into(),
        );
    }
    // The disclaimer is attached here, not taken from the model, so it is
    // byte-for-byte stable.
    Ok(InsuranceSummaryOutput {
        insurance_summary: summary,
        disclaimer: prompts::INSURANCE_DISCLAIMER.to_string(),
    })
}

fn insurance_cdt_entries(selection: &CodeSelection) -> Vec<CdtCodeEntry> {
    let mut entries = vec![CdtCodeEntry {
        code: selection.primary_code.clone(),
        description: selection.primary_description.clone(),
        category: selection.primary_category,
    }];
    entries.extend(selection.add_ons.iter().map(|a| CdtCodeEntry {
        code: a.code.clone(),
        description: a.description.clone(),
        category: a.category,
    }));
    entries
}

// ── Shared steps ────────────────────────────────────────────

/// Resolve the seed for this generation.
///
/// Fresh generations start at the configured per-kind seed. Regenerations
/// require a resolvable parent of the same kind owned by the same user,
/// and continue its chain with `parent.seed + 1`. Two concurrent
/// regenerations of the same parent both succeed as siblings with equal
/// seeds.
fn resolve_seed(
    conn: &rusqlite::Connection,
    settings: &Settings,
    kind: DocumentKind,
    user_id: &str,
    is_regeneration: bool,
    previous_version_uuid: Option<&str>,
) -> Result<(i64, Option<String>), GenerationError> {
    if !is_regeneration {
        return Ok((schema_registry::initial_seed(settings, kind), None));
    }

    let parent_id = previous_version_uuid
        .filter(|p| !p.is_empty())
        .ok_or(GenerationError::RegenerationMissingParent)?;

    let parent = audit::get_generation(conn, parent_id)?
        .filter(|p| p.document_kind == kind && p.user_id == user_id)
        .ok_or_else(|| GenerationError::ParentNotFound(parent_id.to_string()))?;

    let base = parent
        .seed
        .unwrap_or_else(|| schema_registry::initial_seed(settings, kind));
    Ok((base + 1, Some(parent.id.to_string())))
}

#[allow(clippy::too_many_arguments)]
fn write_success_audit(
    state: &AppState,
    user_id: &str,
    kind: DocumentKind,
    input_json: &Value,
    output_json: &Value,
    usage: &Usage,
    is_regenerated: bool,
    previous_version_uuid: Option<String>,
) -> Result<GenerationRecord, GenerationError> {
    let input_data = redact::prepare_audit_payload(&state.settings, input_json);
    let output_data = redact::prepare_audit_payload(&state.settings, output_json);
    let conn = state.db()?;
    Ok(audit::insert_generation(
        &conn,
        &NewGeneration {
            user_id: user_id.to_string(),
            document_kind: kind,
            document_version: schema_registry::document_version(kind).to_string(),
            input_data,
            output_data,
            model_used: state.settings.openai_model.clone(),
            tokens_used: Some(usage.tokens_used),
            generation_time_ms: Some(usage.generation_time_ms),
            status: GenerationStatus::Success,
            error_message: None,
            seed: Some(usage.seed),
            is_regenerated,
            previous_version_uuid,
        },
    )?)
}

/// Best-effort error audit. The original failure is what the caller
/// reports; a failed audit write is only logged.
#[allow(clippy::too_many_arguments)]
fn write_error_audit(
    state: &AppState,
    user_id: &str,
    kind: DocumentKind,
    input_json: &Value,
    error: &GenerationError,
    seed: Option<i64>,
    is_regenerated: bool,
    previous_version_uuid: Option<String>,
) {
    let attempt = (|| -> Result<(), GenerationError> {
        let input_data = redact::prepare_audit_payload(&state.settings, input_json);
        let conn = state.db()?;
        audit::insert_generation(
            &conn,
            &NewGeneration {
                user_id: user_id.to_string(),
                document_kind: kind,
                document_version: schema_registry::document_version(kind).to_string(),
                input_data,
                output_data: "{}".to_string(),
                model_used: state.settings.openai_model.clone(),
                tokens_used: None,
                generation_time_ms: None,
                status: GenerationStatus::Error,
                error_message: Some(error.to_string()),
                seed,
                is_regenerated,
                previous_version_uuid,
            },
        )?;
        Ok(())
    })();

    if let Err(audit_error) = attempt {
        tracing::error!(
            user_id,
            document_kind = %kind,
            %audit_error,
            "Failed to write error audit record"
        );
    }
}
