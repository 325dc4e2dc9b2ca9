use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// One schedulable date belonging to a job. Entries are cancelled and
/// rescheduled independently; `date` is always a calendar-day key
/// (UTC midnight labelled with the Eastern-observed date).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateEntry {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_date: Option<DateTime<Utc>>,
}

impl DateEntry {
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            date,
            cancelled: false,
            cancelled_at: None,
            rescheduled: None,
            rescheduled_at: None,
            original_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,

    pub name: String,
    pub email: String,
    pub phone: String,

    pub company: Option<String>,
    pub coordinator: Option<String>,
    pub site_contact: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub project_ref: Option<String>,

    pub flagger_count: i32,
    pub additional_flaggers: bool,
    pub additional_flagger_count: i32,
    pub equipment: Json<Vec<String>>,
    pub terms_accepted: bool,

    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub message: Option<String>,

    pub job_dates: Json<Vec<DateEntry>>,
    pub cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub emergency: bool,

    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Restores the invariant that the job-level flag is true iff every
    /// entry is cancelled. Must run after every per-date mutation.
    pub fn recompute_cancelled(&mut self, now: DateTime<Utc>) {
        let all_cancelled =
            !self.job_dates.0.is_empty() && self.job_dates.0.iter().all(|e| e.cancelled);
        if all_cancelled {
            self.cancelled = true;
            self.cancelled_at.get_or_insert(now);
        } else {
            self.cancelled = false;
            self.cancelled_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, 0, 0, 0).unwrap()
    }

    fn job_with_entries(entries: Vec<DateEntry>) -> Job {
        Job {
            id: Uuid::new_v4(),
            name: "Dispatch".into(),
            email: "dispatch@example.com".into(),
            phone: "555-0100".into(),
            company: None,
            coordinator: None,
            site_contact: None,
            start_time: None,
            end_time: None,
            project_ref: None,
            flagger_count: 2,
            additional_flaggers: false,
            additional_flagger_count: 0,
            equipment: Json(vec![]),
            terms_accepted: true,
            address: None,
            city: None,
            state: None,
            zip: None,
            message: None,
            job_dates: Json(entries),
            cancelled: false,
            cancelled_at: None,
            emergency: false,
            version: 0,
            created_at: day(1),
            updated_at: day(1),
        }
    }

    #[test]
    fn aggregate_flag_tracks_entries() {
        let mut job = job_with_entries(vec![DateEntry::new(day(10)), DateEntry::new(day(11))]);
        let now = day(5);

        job.job_dates.0[0].cancelled = true;
        job.recompute_cancelled(now);
        assert!(!job.cancelled);
        assert!(job.cancelled_at.is_none());

        job.job_dates.0[1].cancelled = true;
        job.recompute_cancelled(now);
        assert!(job.cancelled);
        assert_eq!(job.cancelled_at, Some(now));
    }

    #[test]
    fn uncancelling_an_entry_clears_the_aggregate() {
        let mut job = job_with_entries(vec![DateEntry::new(day(10))]);
        job.job_dates.0[0].cancelled = true;
        job.recompute_cancelled(day(5));
        assert!(job.cancelled);

        job.job_dates.0[0].cancelled = false;
        job.recompute_cancelled(day(6));
        assert!(!job.cancelled);
        assert!(job.cancelled_at.is_none());
    }

    #[test]
    fn cancelled_at_is_sticky_while_fully_cancelled() {
        let mut job = job_with_entries(vec![DateEntry::new(day(10))]);
        job.job_dates.0[0].cancelled = true;
        job.recompute_cancelled(day(5));
        job.recompute_cancelled(day(7));
        assert_eq!(job.cancelled_at, Some(day(5)));
    }

    #[test]
    fn empty_date_list_is_not_cancelled() {
        let mut job = job_with_entries(vec![]);
        job.recompute_cancelled(day(5));
        assert!(!job.cancelled);
    }

    #[test]
    fn date_entry_json_shape_is_camel_case() {
        let mut entry = DateEntry::new(day(10));
        entry.cancelled = true;
        entry.cancelled_at = Some(day(12));
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("cancelledAt").is_some());
        assert!(value.get("date").is_some());
        assert!(value.get("originalDate").is_none());
    }
}
