//! Notification bodies. Pure string composition so the content can be
//! unit-tested without a mail relay.

use crate::config::get_config;
use crate::models::job::Job;
use crate::services::notification_service::OutboundEmail;
use crate::utils::day_key::DayKey;

pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

impl EmailContent {
    /// Wraps the content for delivery, BCC'ing the office mailboxes.
    pub fn to_outbound(self, to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            bcc: get_config().office_bcc.clone(),
            subject: self.subject,
            html: self.html,
            attachments: Vec::new(),
        }
    }
}

fn cancel_link(api_base: &str, job: &Job, day: DayKey) -> String {
    format!("{}/cancel-job/{}?date={}", api_base, job.id, day.iso_date())
}

fn manage_link(client_url: &str, job: &Job) -> String {
    format!("{}/manage-job/{}", client_url, job.id)
}

fn job_header(job: &Job) -> String {
    let mut lines = format!(
        "<p><strong>{}</strong> &lt;{}&gt; &middot; {}</p>",
        job.name, job.email, job.phone
    );
    if let Some(company) = &job.company {
        lines.push_str(&format!("<p>Company: {}</p>", company));
    }
    if let (Some(start), Some(end)) = (&job.start_time, &job.end_time) {
        lines.push_str(&format!("<p>On site: {} to {}</p>", start, end));
    }
    lines.push_str(&format!("<p>Flaggers: {}", job.flagger_count));
    if job.additional_flaggers && job.additional_flagger_count > 0 {
        lines.push_str(&format!(" (+{} additional)", job.additional_flagger_count));
    }
    lines.push_str("</p>");
    lines
}

fn scheduled_dates_list(jobs: &[Job], api_base: &str) -> String {
    let mut html = String::from("<ul>");
    for job in jobs {
        for entry in job.job_dates.0.iter().filter(|e| !e.cancelled) {
            let day = DayKey::from_stored(entry.date);
            html.push_str(&format!(
                "<li>{} &mdash; <a href=\"{}\">cancel this date</a></li>",
                day.display(),
                cancel_link(api_base, job, day)
            ));
        }
    }
    html.push_str("</ul>");
    html
}

/// Direct-path summary: one email covering every job created in the
/// submission, one cancel link per date.
pub fn booking_confirmed(jobs: &[Job], api_base: &str) -> EmailContent {
    let subject = "Traffic control request received".to_string();
    let mut html = String::from("<h2>Your traffic control request is scheduled</h2>");
    if let Some(first) = jobs.first() {
        html.push_str(&job_header(first));
    }
    html.push_str("<p>Scheduled dates:</p>");
    html.push_str(&scheduled_dates_list(jobs, api_base));
    EmailContent { subject, html }
}

/// Deferred-path request: the booking is held until the requester
/// clicks one of the two links.
pub fn confirmation_request(
    name: &str,
    dates: &[DayKey],
    additional_flagger_count: i32,
    yes_url: &str,
    no_url: &str,
) -> EmailContent {
    let subject = "Please confirm additional flaggers".to_string();
    let mut html = format!(
        "<h2>Confirm your traffic control request</h2>\
         <p>Hello {},</p>\
         <p>You requested {} additional flagger(s). Additional flaggers are \
         billed separately, so we need your confirmation before scheduling.</p>\
         <p>Requested dates:</p><ul>",
        name, additional_flagger_count
    );
    for day in dates {
        html.push_str(&format!("<li>{}</li>", day.display()));
    }
    html.push_str(&format!(
        "</ul>\
         <p><a href=\"{}\">Yes, schedule with additional flaggers</a></p>\
         <p><a href=\"{}\">No, schedule without additional flaggers</a></p>\
         <p>Nothing is booked until you choose.</p>",
        yes_url, no_url
    ));
    EmailContent { subject, html }
}

/// Post-confirmation summary, worded by the requester's decision.
pub fn confirmation_outcome(jobs: &[Job], with_flaggers: bool, api_base: &str) -> EmailContent {
    let subject = if with_flaggers {
        "Traffic control scheduled with additional flaggers".to_string()
    } else {
        "Traffic control scheduled without additional flaggers".to_string()
    };
    let mut html = format!(
        "<h2>{}</h2>",
        if with_flaggers {
            "Scheduled with additional flaggers"
        } else {
            "Scheduled without additional flaggers"
        }
    );
    if let Some(first) = jobs.first() {
        html.push_str(&job_header(first));
    }
    html.push_str("<p>Scheduled dates:</p>");
    html.push_str(&scheduled_dates_list(jobs, api_base));
    EmailContent { subject, html }
}

pub fn job_updated(job: &Job, api_base: &str) -> EmailContent {
    let subject = "Your traffic control job was updated".to_string();
    let mut html = String::from("<h2>Job updated</h2>");
    html.push_str(&job_header(job));
    html.push_str("<p>Current dates:</p>");
    html.push_str(&scheduled_dates_list(std::slice::from_ref(job), api_base));
    EmailContent { subject, html }
}

pub fn date_rescheduled(job: &Job, old_day: DayKey, new_day: DayKey) -> EmailContent {
    let subject = "Your traffic control date was rescheduled".to_string();
    let mut html = format!(
        "<h2>Date rescheduled</h2>\
         <p>{} has been moved to {}.</p>",
        old_day.display(),
        new_day.display()
    );
    html.push_str(&job_header(job));
    EmailContent { subject, html }
}

pub fn date_cancelled(job: &Job, day: DayKey, client_url: &str) -> EmailContent {
    let subject = "Traffic control date cancelled".to_string();
    let html = format!(
        "<h2>Date cancelled</h2>\
         <p>The {} date on your traffic control job has been cancelled.</p>\
         <p><a href=\"{}\">Review or update the remaining dates</a></p>",
        day.display(),
        manage_link(client_url, job)
    );
    EmailContent { subject, html }
}

/// Whole-job cancellation. Lists only the dates cancelled by this
/// operation; past dates are left alone and unmentioned.
pub fn job_cancelled(job: &Job, cancelled_days: &[DayKey]) -> EmailContent {
    let subject = "Traffic control job cancelled".to_string();
    let mut html = format!(
        "<h2>Job cancelled</h2><p>For {}, the following dates were cancelled:</p><ul>",
        job.name
    );
    for day in cancelled_days {
        html.push_str(&format!("<li>{}</li>", day.display()));
    }
    html.push_str("</ul>");
    EmailContent { subject, html }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{DateEntry, Job};
    use chrono::{TimeZone, Utc};
    use sqlx::types::Json;
    use uuid::Uuid;

    fn sample_job() -> Job {
        let d1 = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap();
        let mut cancelled_entry = DateEntry::new(d2);
        cancelled_entry.cancelled = true;
        Job {
            id: Uuid::new_v4(),
            name: "Pat Lee".into(),
            email: "pat@example.com".into(),
            phone: "555-0100".into(),
            company: Some("Acme Paving".into()),
            coordinator: None,
            site_contact: None,
            start_time: Some("7:00 AM".into()),
            end_time: Some("3:30 PM".into()),
            project_ref: None,
            flagger_count: 2,
            additional_flaggers: false,
            additional_flagger_count: 0,
            equipment: Json(vec!["cones".into()]),
            terms_accepted: true,
            address: None,
            city: None,
            state: None,
            zip: None,
            message: None,
            job_dates: Json(vec![DateEntry::new(d1), cancelled_entry]),
            cancelled: false,
            cancelled_at: None,
            emergency: false,
            version: 0,
            created_at: d1,
            updated_at: d1,
        }
    }

    #[test]
    fn booking_summary_links_only_live_dates() {
        let job = sample_job();
        let email = booking_confirmed(std::slice::from_ref(&job), "https://api.example.com");
        assert!(email.html.contains("03/10/2025"));
        assert!(!email.html.contains("03/11/2025"));
        assert!(email
            .html
            .contains(&format!("/cancel-job/{}?date=2025-03-10", job.id)));
    }

    #[test]
    fn confirmation_request_carries_both_links() {
        let day = DayKey::normalize("2025-03-10").unwrap();
        let email = confirmation_request(
            "Pat Lee",
            &[day],
            2,
            "https://api.example.com/confirm?confirm=yes",
            "https://api.example.com/confirm?confirm=no",
        );
        assert!(email.html.contains("confirm=yes"));
        assert!(email.html.contains("confirm=no"));
        assert!(email.html.contains("03/10/2025"));
        assert!(email.html.contains("2 additional flagger"));
    }

    #[test]
    fn confirmation_outcome_subject_follows_decision() {
        let job = sample_job();
        let yes = confirmation_outcome(std::slice::from_ref(&job), true, "https://api");
        let no = confirmation_outcome(std::slice::from_ref(&job), false, "https://api");
        assert!(yes.subject.contains("with additional flaggers"));
        assert!(no.subject.contains("without additional flaggers"));
    }

    #[test]
    fn job_cancelled_lists_only_this_operations_dates() {
        let job = sample_job();
        let day = DayKey::normalize("2025-03-10").unwrap();
        let email = job_cancelled(&job, &[day]);
        assert!(email.html.contains("03/10/2025"));
        assert!(!email.html.contains("03/11/2025"));
    }
}
