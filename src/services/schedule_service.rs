use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::get_config;
use crate::dto::job_dto::{
    CreateJobRequest, FailedDate, PendingConfirmation, SubmissionResponse,
};
use crate::error::{Error, Result};
use crate::services::emails;
use crate::services::job_service::JobService;
use crate::services::notification_service::Notify;
use crate::utils::confirm_token::TokenSigner;
use crate::utils::day_key::DayKey;

/// End-to-end booking orchestration: normalization, capacity checks,
/// the direct/deferred branch, and confirmation-link consumption.
#[derive(Clone)]
pub struct ScheduleService {
    jobs: JobService,
    signer: TokenSigner,
    notifier: Arc<dyn Notify>,
}

impl ScheduleService {
    pub fn new(jobs: JobService, signer: TokenSigner, notifier: Arc<dyn Notify>) -> Self {
        Self {
            jobs,
            signer,
            notifier,
        }
    }

    /// Handles `POST /trafficcontrol`.
    ///
    /// All dates are normalized and capacity-checked before anything is
    /// created, so dates within one batch never contend with each other.
    /// Per-date failures are collected, not fatal; only a batch with
    /// zero admissible dates fails the request.
    pub async fn submit(&self, req: CreateJobRequest) -> Result<SubmissionResponse> {
        let mut scheduled: Vec<DayKey> = Vec::new();
        let mut failed: Vec<FailedDate> = Vec::new();

        for raw in &req.job_date {
            match DayKey::normalize(raw) {
                Err(_) => failed.push(FailedDate {
                    date: raw.clone(),
                    reason: "unrecognized date".to_string(),
                }),
                Ok(day) => {
                    if self.jobs.is_day_full(day).await? {
                        failed.push(FailedDate {
                            date: raw.clone(),
                            reason: format!("{} is fully booked", day.display()),
                        });
                    } else {
                        scheduled.push(day);
                    }
                }
            }
        }

        if scheduled.is_empty() {
            return Err(Error::Capacity(
                "The requested dates are full. Please choose different dates.".to_string(),
            ));
        }

        if req.additional_flaggers && req.additional_flagger_count > 0 {
            return self.defer_for_confirmation(req, scheduled, failed);
        }

        // Create pass, separate from the check pass above.
        let mut created = Vec::with_capacity(scheduled.len());
        for day in &scheduled {
            created.push(
                self.jobs
                    .create_job(&req, *day, req.additional_flaggers, req.additional_flagger_count)
                    .await?,
            );
        }

        tracing::info!(jobs = created.len(), "traffic control jobs created");
        let content = emails::booking_confirmed(&created, &get_config().api_base_url);
        self.notifier.notify(content.to_outbound(&req.email));

        Ok(SubmissionResponse::Created {
            message: "Traffic control request received".to_string(),
            scheduled_dates: scheduled.iter().map(DayKey::display).collect(),
            failed_dates: failed,
            created_jobs: created,
        })
    }

    /// Deferred path: the whole booking rides inside a signed token in
    /// the requester's email; no rows exist until a link is clicked.
    fn defer_for_confirmation(
        &self,
        req: CreateJobRequest,
        scheduled: Vec<DayKey>,
        failed: Vec<FailedDate>,
    ) -> Result<SubmissionResponse> {
        let config = get_config();
        let pending = PendingConfirmation {
            requester_email: req.email.clone(),
            additional_flagger_count: req.additional_flagger_count,
            scheduled_dates: scheduled.iter().map(DayKey::to_rfc3339).collect(),
            issued_at: Utc::now(),
            form: req.clone(),
        };
        let token = self.signer.sign(&pending)?;
        let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
        let yes_url = format!(
            "{}/confirm-additional-flagger?token={}&confirm=yes",
            config.api_base_url, encoded
        );
        let no_url = format!(
            "{}/confirm-additional-flagger?token={}&confirm=no",
            config.api_base_url, encoded
        );

        let content = emails::confirmation_request(
            &req.name,
            &scheduled,
            req.additional_flagger_count,
            &yes_url,
            &no_url,
        );
        self.notifier.notify(content.to_outbound(&req.email));

        Ok(SubmissionResponse::PendingConfirmation {
            message: "Additional flaggers requested. Check your email to confirm before the \
                      dates are booked."
                .to_string(),
            requires_confirmation: true,
            scheduled_dates: scheduled.iter().map(DayKey::display).collect(),
            failed_dates: failed,
        })
    }

    /// Consumes an emailed confirmation link.
    ///
    /// Capacity is re-checked for every pending date before creating
    /// anything; if any day filled up since the token was issued the
    /// whole confirmation fails closed.
    pub async fn confirm(&self, token: &str, decision: &str) -> Result<String> {
        let accept = match decision {
            "yes" => true,
            "no" => false,
            _ => {
                return Err(Error::BadRequest(
                    "confirm must be \"yes\" or \"no\"".to_string(),
                ))
            }
        };

        let pending: PendingConfirmation = self.signer.verify(token).ok_or(Error::Token)?;

        let config = get_config();
        if pending.issued_at + Duration::hours(config.confirm_token_ttl_hours) < Utc::now() {
            return Err(Error::Token);
        }

        let mut days = Vec::with_capacity(pending.scheduled_dates.len());
        for iso in &pending.scheduled_dates {
            let instant: DateTime<Utc> = DateTime::parse_from_rfc3339(iso)
                .map_err(|_| Error::Token)?
                .with_timezone(&Utc);
            days.push(DayKey::from_stored(instant));
        }
        if days.is_empty() {
            return Err(Error::Token);
        }

        for day in &days {
            if self.jobs.is_day_full(*day).await? {
                return Err(Error::Capacity(format!(
                    "{} is now fully booked. Please submit a new request.",
                    day.display()
                )));
            }
        }

        let additional_flagger_count = if accept {
            pending.additional_flagger_count
        } else {
            0
        };
        let mut created = Vec::with_capacity(days.len());
        for day in &days {
            created.push(
                self.jobs
                    .create_job(&pending.form, *day, accept, additional_flagger_count)
                    .await?,
            );
        }

        tracing::info!(
            jobs = created.len(),
            with_flaggers = accept,
            "deferred booking confirmed"
        );
        let content = emails::confirmation_outcome(&created, accept, &config.api_base_url);
        self.notifier
            .notify(content.to_outbound(&pending.requester_email));

        Ok(if accept {
            "Your traffic control job is scheduled with additional flaggers.".to_string()
        } else {
            "Your traffic control job is scheduled without additional flaggers.".to_string()
        })
    }
}
