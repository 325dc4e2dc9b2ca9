pub mod emails;
pub mod job_service;
pub mod notification_service;
pub mod schedule_service;
