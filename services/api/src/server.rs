use crate::cli::ServeArgs;
use crate::infra::{load_seed, AppState, TracingNoticePublisher};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use research_portal::config::AppConfig;
use research_portal::error::AppError;
use research_portal::telemetry;
use research_portal::workflows::projects::{
    InMemoryDirectory, InMemoryPortalStore, ProjectWorkflowService,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed) = args.seed.take() {
        config.seed_file = Some(seed);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = Arc::new(InMemoryDirectory::default());
    if let Some(path) = &config.seed_file {
        let seed = load_seed(path)?;
        let (teachers, students) = seed.apply(&directory)?;
        info!(path = %path.display(), teachers, students, "directory seeded");
    }

    let service = Arc::new(ProjectWorkflowService::new(
        Arc::new(InMemoryPortalStore::default()),
        directory,
        Arc::new(TracingNoticePublisher),
        config.workflow.clone(),
    ));

    let app = with_portal_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "research portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
