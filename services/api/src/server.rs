use crate::cli::ServeArgs;
use crate::infra::{seed_demo_bookings, seed_demo_catalog, AppState};
use crate::routes::with_scheduling_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use turnover::config::AppConfig;
use turnover::error::AppError;
use turnover::scheduling::{InMemoryStore, SystemClock, TurnoverService};
use turnover::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryStore::default());
    if args.seed_demo {
        seed_demo_catalog(&store);
        seed_demo_bookings(&store, Local::now().date_naive());
        info!("demo catalog seeded");
    }
    let service = Arc::new(TurnoverService::new(
        store,
        Arc::new(SystemClock),
        config.scheduling.clone(),
    ));

    let app = with_scheduling_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        scheduler_window_days = config.scheduling.scheduler_window_days,
        "turnover scheduling service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
