use crate::cli::ServeArgs;
use crate::infra::{AppState, StaticEnrollmentDirectory};
use crate::routes::with_registry_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use student_standing::config::AppConfig;
use student_standing::error::AppError;
use student_standing::registry::{
    ChangeNotifier, FileExportSink, MemoryRecordStore, RegistryService,
};
use student_standing::telemetry;
use tracing::info;

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

    let store = Arc::new(MemoryRecordStore::new());
    let export = Arc::new(FileExportSink::new(config.export_path.clone()));
    let enrollment = Arc::new(StaticEnrollmentDirectory::from_setting(&config.course_rosters));
    let service = Arc::new(RegistryService::new(
        store,
        ChangeNotifier::default(),
        export,
        enrollment,
        config.budgets,
    ));

    let app = with_registry_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, export = %config.export_path.display(), "student standing registry ready");

    axum::serve(listener, app).await?;
    Ok(())
}
