use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::config::get_config;
use crate::dto::job_dto::{
    CancelQuery, ConfirmQuery, CreateJobRequest, ManageJobRequest, RescheduleRequest,
};
use crate::error::{Error, Result};
use crate::utils::validation::validate;
use crate::AppState;

pub async fn create_traffic_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<impl IntoResponse> {
    validate(&req)?;
    let outcome = state.schedule_service.submit(req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Landing point of the emailed yes/no links. The caller is an email
/// client, so every outcome is a browser redirect to the client status
/// page, never a JSON body.
pub async fn confirm_additional_flagger(
    State(state): State<AppState>,
    Query(params): Query<ConfirmQuery>,
) -> Redirect {
    let token = params.token.unwrap_or_default();
    let confirm = params.confirm.unwrap_or_default();
    match state.schedule_service.confirm(&token, &confirm).await {
        Ok(message) => status_redirect("success", &message),
        Err(err) => {
            tracing::warn!(error = %err, "confirmation link rejected");
            status_redirect("error", &redirect_error_message(&err))
        }
    }
}

fn redirect_error_message(err: &Error) -> String {
    match err {
        Error::Capacity(msg) | Error::BadRequest(msg) => msg.clone(),
        Error::Token => "This confirmation link is invalid or has expired.".to_string(),
        _ => "Something went wrong while confirming your request. Please contact the office."
            .to_string(),
    }
}

fn status_redirect(status: &str, message: &str) -> Redirect {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("status", status)
        .append_pair("message", message)
        .finish();
    Redirect::to(&format!(
        "{}/confirmation-status?{}",
        get_config().client_url,
        query
    ))
}

pub async fn manage_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ManageJobRequest>,
) -> Result<impl IntoResponse> {
    let job = state.job_service.update_whole_job(id, body.updated_job).await?;
    Ok(Json(json!({ "message": "Job updated", "job": job })))
}

pub async fn reschedule_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RescheduleRequest>,
) -> Result<impl IntoResponse> {
    let old_date = body
        .old_date
        .ok_or_else(|| Error::BadRequest("oldDate is required".to_string()))?;
    let new_date = body
        .new_date
        .ok_or_else(|| Error::BadRequest("newDate is required".to_string()))?;
    let job = state
        .job_service
        .reschedule_date(id, &old_date, &new_date)
        .await?;
    Ok(Json(json!({ "message": "Job date rescheduled", "job": job })))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CancelQuery>,
) -> Result<impl IntoResponse> {
    match params.date {
        Some(date) => {
            state.job_service.cancel_date(id, &date).await?;
            Ok(Json(json!({ "message": "Job date cancelled" })))
        }
        None => {
            let (job, days) = state.job_service.cancel_job(id).await?;
            let message = if job.cancelled {
                "Job cancelled".to_string()
            } else {
                format!(
                    "{} future date(s) cancelled; past dates were left unchanged",
                    days.len()
                )
            };
            Ok(Json(json!({ "message": message })))
        }
    }
}
