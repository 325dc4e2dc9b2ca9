use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use trafficcontrol_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::rate_limit,
    routes, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let public_api = Router::new()
        .route(
            "/trafficcontrol",
            post(routes::job_routes::create_traffic_job),
        )
        .route(
            "/confirm-additional-flagger",
            get(routes::job_routes::confirm_additional_flagger),
        )
        .route("/manage-job/:id", patch(routes::job_routes::manage_job))
        .route(
            "/reschedule-job/:id",
            patch(routes::job_routes::reschedule_job),
        )
        .route("/cancel-job/:id", delete(routes::job_routes::cancel_job))
        .route("/jobs", get(routes::calendar_routes::jobs_on_day))
        .route("/jobs/month", get(routes::calendar_routes::jobs_in_month))
        .route("/jobs/full-dates", get(routes::calendar_routes::full_dates))
        .route(
            "/jobs/cancelled",
            get(routes::calendar_routes::cancelled_jobs),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::Throttle::per_second(config.public_rps),
            rate_limit::throttle_middleware,
        ));

    let app = base_routes
        .merge(public_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
