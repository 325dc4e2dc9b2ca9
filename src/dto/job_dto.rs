use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::job::Job;

/// Body of `POST /trafficcontrol`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,

    pub company: Option<String>,
    pub coordinator: Option<String>,
    pub site_contact: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub project_ref: Option<String>,

    #[serde(default)]
    pub flagger_count: i32,
    #[serde(default)]
    pub additional_flaggers: bool,
    #[serde(default)]
    pub additional_flagger_count: i32,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub terms_accepted: bool,

    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub message: Option<String>,

    #[serde(default)]
    pub emergency: bool,

    /// Candidate dates, free-form client input.
    #[validate(length(min = 1, message = "At least one job date is required"))]
    #[serde(default)]
    pub job_date: Vec<String>,
}

/// A requested date that could not be scheduled. Informational: the
/// rest of the batch proceeds without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDate {
    pub date: String,
    pub reason: String,
}

/// `POST /trafficcontrol` outcome. Untagged: the two arms carry
/// distinguishing fields (`requiresConfirmation` vs `createdJobs`).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SubmissionResponse {
    #[serde(rename_all = "camelCase")]
    PendingConfirmation {
        message: String,
        requires_confirmation: bool,
        scheduled_dates: Vec<String>,
        failed_dates: Vec<FailedDate>,
    },
    #[serde(rename_all = "camelCase")]
    Created {
        message: String,
        scheduled_dates: Vec<String>,
        failed_dates: Vec<FailedDate>,
        created_jobs: Vec<Job>,
    },
}

/// Deferred booking payload carried entirely inside the signed token;
/// nothing is persisted until the emailed link is clicked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub form: CreateJobRequest,
    /// Day keys already admitted by the capacity check, RFC 3339.
    pub scheduled_dates: Vec<String>,
    pub additional_flagger_count: i32,
    pub requester_email: String,
    pub issued_at: DateTime<Utc>,
}

/// Both fields optional: the endpoint is reached from email clients and
/// must redirect on any malformed link rather than return JSON.
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub token: Option<String>,
    pub confirm: Option<String>,
}

/// Body of `PATCH /manage-job/:id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageJobRequest {
    pub updated_job: JobPatch,
}

/// Allow-list of patchable fields. `id`, `version` and the aggregate
/// cancellation state are never client-writable. `job_dates` is a full
/// date-list replacement, handled as its own arm by the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub coordinator: Option<String>,
    pub site_contact: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub project_ref: Option<String>,
    pub flagger_count: Option<i32>,
    pub additional_flaggers: Option<bool>,
    pub additional_flagger_count: Option<i32>,
    pub equipment: Option<Vec<String>>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub message: Option<String>,
    pub emergency: Option<bool>,
    pub job_dates: Option<Vec<String>>,
}

/// Body of `PATCH /reschedule-job/:id`. Fields are optional so their
/// absence surfaces as a 400 with a precise message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub old_date: Option<String>,
    pub new_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape_is_camel_case() {
        let body = serde_json::json!({
            "name": "Pat Lee",
            "email": "pat@example.com",
            "phone": "555-0100",
            "additionalFlaggers": true,
            "additionalFlaggerCount": 2,
            "flaggerCount": 3,
            "termsAccepted": true,
            "jobDate": ["2025-03-10", "2025-03-11"]
        });
        let req: CreateJobRequest = serde_json::from_value(body).unwrap();
        assert!(req.additional_flaggers);
        assert_eq!(req.additional_flagger_count, 2);
        assert_eq!(req.job_date.len(), 2);
    }

    #[test]
    fn missing_dates_fail_validation() {
        let body = serde_json::json!({
            "name": "Pat Lee",
            "email": "pat@example.com",
            "phone": "555-0100"
        });
        let req: CreateJobRequest = serde_json::from_value(body).unwrap();
        assert!(crate::utils::validation::validate(&req).is_err());
    }

    #[test]
    fn patch_never_exposes_identity_fields() {
        let body = serde_json::json!({
            "coordinator": "J. Ortiz",
            "jobDates": ["2025-04-01"]
        });
        let patch: JobPatch = serde_json::from_value(body).unwrap();
        assert_eq!(patch.coordinator.as_deref(), Some("J. Ortiz"));
        assert_eq!(patch.job_dates.as_deref(), Some(&["2025-04-01".to_string()][..]));
    }

    #[test]
    fn pending_confirmation_round_trips_through_json() {
        let req: CreateJobRequest = serde_json::from_value(serde_json::json!({
            "name": "Pat Lee",
            "email": "pat@example.com",
            "phone": "555-0100",
            "jobDate": ["2025-03-10"]
        }))
        .unwrap();
        let pending = PendingConfirmation {
            requester_email: req.email.clone(),
            additional_flagger_count: 2,
            scheduled_dates: vec!["2025-03-10T00:00:00+00:00".into()],
            issued_at: Utc::now(),
            form: req,
        };
        let json = serde_json::to_string(&pending).unwrap();
        let back: PendingConfirmation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.requester_email, "pat@example.com");
        assert_eq!(back.scheduled_dates.len(), 1);
    }
}
