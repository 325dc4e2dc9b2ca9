use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::dto::job_dto::{DayQuery, MonthQuery, YearQuery};
use crate::error::{Error, Result};
use crate::utils::day_key::DayKey;
use crate::AppState;

pub async fn jobs_on_day(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> Result<impl IntoResponse> {
    let day = DayKey::normalize(&query.date)?;
    let jobs = state.job_service.jobs_on_day(day).await?;
    Ok(Json(json!({ "date": day.iso_date(), "jobs": jobs })))
}

pub async fn jobs_in_month(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse> {
    let month = query
        .month
        .ok_or_else(|| Error::BadRequest("month is required".to_string()))?;
    let year = query
        .year
        .ok_or_else(|| Error::BadRequest("year is required".to_string()))?;
    if !(1..=12).contains(&month) {
        return Err(Error::BadRequest(
            "month must be between 1 and 12".to_string(),
        ));
    }
    let jobs = state.job_service.jobs_in_month(year, month).await?;
    Ok(Json(json!({ "jobs": jobs })))
}

/// Days already at the cap, for greying out the client's date picker.
pub async fn full_dates(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let days = state.job_service.full_days().await?;
    Ok(Json(json!({ "fullDates": days })))
}

pub async fn cancelled_jobs(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse> {
    let year = query.year.unwrap_or_else(|| DayKey::today().year());
    let jobs = state.job_service.cancelled_in_year(year).await?;
    Ok(Json(json!({ "year": year, "jobs": jobs })))
}
