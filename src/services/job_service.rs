use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::get_config;
use crate::dto::job_dto::{CreateJobRequest, JobPatch};
use crate::error::{Error, Result};
use crate::models::job::{DateEntry, Job};
use crate::services::emails;
use crate::services::notification_service::Notify;
use crate::utils::day_key::DayKey;

/// Maximum non-cancelled date entries per calendar day, across all
/// non-cancelled jobs. A day at exactly the cap is full.
pub const DAILY_JOB_CAP: i64 = 10;

const JOB_COLUMNS: &str = "name, email, phone, company, coordinator, site_contact, \
     start_time, end_time, project_ref, flagger_count, additional_flaggers, \
     additional_flagger_count, equipment, terms_accepted, address, city, state, \
     zip, message, job_dates, emergency";

/// Store access and post-creation lifecycle for jobs. Capacity is
/// always recomputed from current rows; nothing is cached.
#[derive(Clone)]
pub struct JobService {
    pool: PgPool,
    notifier: Arc<dyn Notify>,
}

impl JobService {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notify>) -> Self {
        Self { pool, notifier }
    }

    /// Creates one job holding a single date entry, the direct-path and
    /// confirmation-path unit of persistence.
    pub async fn create_job(
        &self,
        req: &CreateJobRequest,
        day: DayKey,
        additional_flaggers: bool,
        additional_flagger_count: i32,
    ) -> Result<Job> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            INSERT INTO jobs ({JOB_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21)
            RETURNING *
            "#
        ))
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(&req.company)
        .bind(&req.coordinator)
        .bind(&req.site_contact)
        .bind(&req.start_time)
        .bind(&req.end_time)
        .bind(&req.project_ref)
        .bind(req.flagger_count)
        .bind(additional_flaggers)
        .bind(additional_flagger_count)
        .bind(Json(req.equipment.clone()))
        .bind(req.terms_accepted)
        .bind(&req.address)
        .bind(&req.city)
        .bind(&req.state)
        .bind(&req.zip)
        .bind(&req.message)
        .bind(Json(vec![DateEntry::new(day.start())]))
        .bind(req.emergency)
        .fetch_one(&self.pool)
        .await
        .map_err(map_create_error)?;
        Ok(job)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job> {
        sqlx::query_as::<_, Job>(r#"SELECT * FROM jobs WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))
    }

    /// Compare-and-swap save keyed on the version read with the job.
    /// A concurrent writer surfaces as a conflict, never a clobber.
    async fn save(&self, job: &Job) -> Result<Job> {
        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                name = $3, email = $4, phone = $5, company = $6, coordinator = $7,
                site_contact = $8, start_time = $9, end_time = $10, project_ref = $11,
                flagger_count = $12, additional_flaggers = $13,
                additional_flagger_count = $14, equipment = $15, terms_accepted = $16,
                address = $17, city = $18, state = $19, zip = $20, message = $21,
                job_dates = $22, cancelled = $23, cancelled_at = $24, emergency = $25,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(job.version)
        .bind(&job.name)
        .bind(&job.email)
        .bind(&job.phone)
        .bind(&job.company)
        .bind(&job.coordinator)
        .bind(&job.site_contact)
        .bind(&job.start_time)
        .bind(&job.end_time)
        .bind(&job.project_ref)
        .bind(job.flagger_count)
        .bind(job.additional_flaggers)
        .bind(job.additional_flagger_count)
        .bind(&job.equipment)
        .bind(job.terms_accepted)
        .bind(&job.address)
        .bind(&job.city)
        .bind(&job.state)
        .bind(&job.zip)
        .bind(&job.message)
        .bind(&job.job_dates)
        .bind(job.cancelled)
        .bind(job.cancelled_at)
        .bind(job.emergency)
        .fetch_optional(&self.pool)
        .await?;
        updated.ok_or_else(|| {
            Error::Conflict("The job was modified concurrently. Reload and try again.".to_string())
        })
    }

    /// Live entry count for one calendar day. Recomputed per check;
    /// cancelled entries and fully-cancelled jobs free their capacity.
    pub async fn count_for_day(&self, day: DayKey) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM jobs j
            CROSS JOIN LATERAL jsonb_array_elements(j.job_dates) AS entry
            WHERE j.cancelled = FALSE
              AND COALESCE((entry->>'cancelled')::boolean, FALSE) = FALSE
              AND (entry->>'date')::timestamptz >= $1
              AND (entry->>'date')::timestamptz < $2
            "#,
        )
        .bind(day.start())
        .bind(day.end())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn is_day_full(&self, day: DayKey) -> Result<bool> {
        Ok(self.count_for_day(day).await? >= DAILY_JOB_CAP)
    }

    /// Whole-job field patch from the allow-listed DTO. A `jobDates`
    /// arm replaces the full date list (normalized, no capacity check).
    pub async fn update_whole_job(&self, id: Uuid, patch: JobPatch) -> Result<Job> {
        let mut job = self.get_job(id).await?;
        apply_patch(&mut job, patch)?;
        job.recompute_cancelled(Utc::now());
        let saved = self.save(&job).await?;

        let content = emails::job_updated(&saved, &get_config().api_base_url);
        self.notifier.notify(content.to_outbound(&saved.email));
        Ok(saved)
    }

    pub async fn reschedule_date(&self, id: Uuid, old_raw: &str, new_raw: &str) -> Result<Job> {
        let mut job = self.get_job(id).await?;
        let old_day = DayKey::normalize(old_raw)?;
        let new_day = DayKey::normalize(new_raw)?;

        let new_day_full = self.is_day_full(new_day).await?;
        reschedule_entry(
            &mut job,
            old_day,
            new_day,
            new_day_full,
            DayKey::today(),
            Utc::now(),
        )?;
        let saved = self.save(&job).await?;

        let content = emails::date_rescheduled(&saved, old_day, new_day);
        self.notifier.notify(content.to_outbound(&saved.email));
        Ok(saved)
    }

    /// Cancels one date of the job, identified by calendar-day equality.
    pub async fn cancel_date(&self, id: Uuid, raw_date: &str) -> Result<Job> {
        let mut job = self.get_job(id).await?;
        let day = DayKey::normalize(raw_date)?;

        cancel_entry(&mut job, day, DayKey::today(), Utc::now())?;
        let saved = self.save(&job).await?;

        let content = emails::date_cancelled(&saved, day, &get_config().client_url);
        self.notifier.notify(content.to_outbound(&saved.email));
        Ok(saved)
    }

    /// Cancels every future, not-yet-cancelled date. Past entries are
    /// immutable history and stay untouched.
    pub async fn cancel_job(&self, id: Uuid) -> Result<(Job, Vec<DayKey>)> {
        let mut job = self.get_job(id).await?;

        let cancelled_days = cancel_future_entries(&mut job, DayKey::today(), Utc::now())?;
        let saved = self.save(&job).await?;

        let content = emails::job_cancelled(&saved, &cancelled_days);
        self.notifier.notify(content.to_outbound(&saved.email));
        Ok((saved, cancelled_days))
    }

    pub async fn jobs_on_day(&self, day: DayKey) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs j
            WHERE j.cancelled = FALSE
              AND EXISTS (
                SELECT 1 FROM jsonb_array_elements(j.job_dates) AS entry
                WHERE COALESCE((entry->>'cancelled')::boolean, FALSE) = FALSE
                  AND (entry->>'date')::timestamptz >= $1
                  AND (entry->>'date')::timestamptz < $2
              )
            ORDER BY j.created_at ASC
            "#,
        )
        .bind(day.start())
        .bind(day.end())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn jobs_in_month(&self, year: i32, month: u32) -> Result<Vec<Job>> {
        let start = DayKey::from_ymd(year, month, 1)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = DayKey::from_ymd(next_year, next_month, 1)?;

        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs j
            WHERE j.cancelled = FALSE
              AND EXISTS (
                SELECT 1 FROM jsonb_array_elements(j.job_dates) AS entry
                WHERE COALESCE((entry->>'cancelled')::boolean, FALSE) = FALSE
                  AND (entry->>'date')::timestamptz >= $1
                  AND (entry->>'date')::timestamptz < $2
              )
            ORDER BY j.created_at ASC
            "#,
        )
        .bind(start.start())
        .bind(end.start())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// Days from today forward whose live entry count has reached the
    /// cap, as `YYYY-MM-DD` strings for client calendars.
    pub async fn full_days(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT (entry->>'date')::timestamptz AS day
            FROM jobs j
            CROSS JOIN LATERAL jsonb_array_elements(j.job_dates) AS entry
            WHERE j.cancelled = FALSE
              AND COALESCE((entry->>'cancelled')::boolean, FALSE) = FALSE
              AND (entry->>'date')::timestamptz >= $1
            GROUP BY 1
            HAVING COUNT(*) >= $2
            ORDER BY 1 ASC
            "#,
        )
        .bind(DayKey::today().start())
        .bind(DAILY_JOB_CAP)
        .fetch_all(&self.pool)
        .await?;

        let mut days = Vec::with_capacity(rows.len());
        for row in rows {
            let day: DateTime<Utc> = row.try_get("day")?;
            days.push(DayKey::from_stored(day).iso_date());
        }
        Ok(days)
    }

    pub async fn cancelled_in_year(&self, year: i32) -> Result<Vec<Job>> {
        let start = DayKey::from_ymd(year, 1, 1)?;
        let end = DayKey::from_ymd(year + 1, 1, 1)?;
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE cancelled = TRUE
              AND cancelled_at >= $1 AND cancelled_at < $2
            ORDER BY cancelled_at ASC
            "#,
        )
        .bind(start.start())
        .bind(end.start())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }
}

fn map_create_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return Error::Conflict(format!(
                "A booking for this contact already exists. Call the office at {} to modify it.",
                get_config().office_phone
            ));
        }
    }
    err.into()
}

/// Locates the entry scheduled on `day`. Prefers a live entry so that a
/// cancelled duplicate never shadows an active one; falls back to the
/// cancelled entry so idempotency guards can fire.
fn entry_index_for_day(job: &Job, day: DayKey) -> Option<usize> {
    job.job_dates
        .0
        .iter()
        .position(|e| !e.cancelled && day.contains(e.date))
        .or_else(|| job.job_dates.0.iter().position(|e| day.contains(e.date)))
}

fn apply_patch(job: &mut Job, patch: JobPatch) -> Result<()> {
    if let Some(v) = patch.name {
        job.name = v;
    }
    if let Some(v) = patch.email {
        job.email = v;
    }
    if let Some(v) = patch.phone {
        job.phone = v;
    }
    if let Some(v) = patch.company {
        job.company = Some(v);
    }
    if let Some(v) = patch.coordinator {
        job.coordinator = Some(v);
    }
    if let Some(v) = patch.site_contact {
        job.site_contact = Some(v);
    }
    if let Some(v) = patch.start_time {
        job.start_time = Some(v);
    }
    if let Some(v) = patch.end_time {
        job.end_time = Some(v);
    }
    if let Some(v) = patch.project_ref {
        job.project_ref = Some(v);
    }
    if let Some(v) = patch.flagger_count {
        job.flagger_count = v;
    }
    if let Some(v) = patch.additional_flaggers {
        job.additional_flaggers = v;
    }
    if let Some(v) = patch.additional_flagger_count {
        job.additional_flagger_count = v;
    }
    if let Some(v) = patch.equipment {
        job.equipment = Json(v);
    }
    if let Some(v) = patch.address {
        job.address = Some(v);
    }
    if let Some(v) = patch.city {
        job.city = Some(v);
    }
    if let Some(v) = patch.state {
        job.state = Some(v);
    }
    if let Some(v) = patch.zip {
        job.zip = Some(v);
    }
    if let Some(v) = patch.message {
        job.message = Some(v);
    }
    if let Some(v) = patch.emergency {
        job.emergency = v;
    }
    if let Some(dates) = patch.job_dates {
        if dates.is_empty() {
            return Err(Error::BadRequest(
                "jobDates replacement must contain at least one date".to_string(),
            ));
        }
        let mut entries = Vec::with_capacity(dates.len());
        for raw in &dates {
            let day = DayKey::normalize(raw)?;
            entries.push(DateEntry::new(day.start()));
        }
        job.job_dates = Json(entries);
    }
    Ok(())
}

fn cancel_entry(job: &mut Job, day: DayKey, today: DayKey, now: DateTime<Utc>) -> Result<()> {
    let idx = entry_index_for_day(job, day).ok_or_else(|| {
        Error::NotFound(format!("No {} date found on this job", day.display()))
    })?;
    if day < today {
        return Err(Error::Conflict(format!(
            "{} is in the past and cannot be cancelled",
            day.display()
        )));
    }
    let entry = &mut job.job_dates.0[idx];
    if entry.cancelled {
        return Err(Error::Conflict(format!(
            "The {} date is already cancelled",
            day.display()
        )));
    }
    entry.cancelled = true;
    entry.cancelled_at = Some(now);
    job.recompute_cancelled(now);
    Ok(())
}

fn cancel_future_entries(job: &mut Job, today: DayKey, now: DateTime<Utc>) -> Result<Vec<DayKey>> {
    let mut cancelled_days = Vec::new();
    for entry in job.job_dates.0.iter_mut() {
        if entry.cancelled {
            continue;
        }
        let day = DayKey::from_stored(entry.date);
        if day < today {
            continue;
        }
        entry.cancelled = true;
        entry.cancelled_at = Some(now);
        cancelled_days.push(day);
    }
    if cancelled_days.is_empty() {
        return Err(Error::BadRequest(
            "No future dates available to cancel".to_string(),
        ));
    }
    job.recompute_cancelled(now);
    Ok(cancelled_days)
}

/// Guards run in request order: the entry must exist before capacity on
/// the target day is even mentioned to the caller.
fn reschedule_entry(
    job: &mut Job,
    old_day: DayKey,
    new_day: DayKey,
    new_day_full: bool,
    today: DayKey,
    now: DateTime<Utc>,
) -> Result<()> {
    let idx = entry_index_for_day(job, old_day).ok_or_else(|| {
        Error::NotFound(format!("No {} date found on this job", old_day.display()))
    })?;
    if old_day < today {
        return Err(Error::Conflict(format!(
            "{} is in the past and cannot be rescheduled",
            old_day.display()
        )));
    }
    let entry = &mut job.job_dates.0[idx];
    if entry.cancelled {
        return Err(Error::Conflict(format!(
            "The {} date is cancelled and cannot be rescheduled",
            old_day.display()
        )));
    }
    if new_day_full {
        return Err(Error::Capacity(format!(
            "{} is fully booked. Please choose another date.",
            new_day.display()
        )));
    }
    entry.original_date = Some(entry.date);
    entry.date = new_day.start();
    entry.rescheduled = Some(true);
    entry.rescheduled_at = Some(now);
    job.recompute_cancelled(now);
    Ok(())
}
