pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::services::{
    job_service::JobService,
    notification_service::{MailRelayNotifier, Notify},
    schedule_service::ScheduleService,
};
use crate::utils::confirm_token::TokenSigner;
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub job_service: JobService,
    pub schedule_service: ScheduleService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        let notifier: Arc<dyn Notify> = Arc::new(MailRelayNotifier::new(
            http_client,
            config.mailer_webhook_url.clone(),
            config.mail_from.clone(),
        ));
        let signer = TokenSigner::new(&config.confirm_secret);

        let job_service = JobService::new(pool.clone(), notifier.clone());
        let schedule_service =
            ScheduleService::new(job_service.clone(), signer, notifier.clone());

        Self {
            pool,
            job_service,
            schedule_service,
        }
    }
}
