use crate::cli::ServeArgs;
use crate::infra::{load_cutoffs, AppState};
use crate::routes::with_lifecycle_routes;
use admission::config::AppConfig;
use admission::error::AppError;
use admission::storage::{FilesystemVault, MemoryRecordStore, SqliteRecordStore};
use admission::telemetry;
use admission::workflows::admissions::{
    AdmissionLifecycleService, RandomConfidenceScorer, RecordStore,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.admissions.database_path.clone() {
        Some(path) => {
            let store = SqliteRecordStore::open(&path)?;
            info!(path = %path.display(), "using sqlite record store");
            serve_with(config, store).await
        }
        None => {
            warn!("APP_DATABASE_PATH unset; records are kept in memory only");
            serve_with(config, MemoryRecordStore::new()).await
        }
    }
}

async fn serve_with<S>(config: AppConfig, store: S) -> Result<(), AppError>
where
    S: RecordStore + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let cutoffs = load_cutoffs(&config.admissions)?;
    let service = Arc::new(AdmissionLifecycleService::new(
        Arc::new(store),
        Arc::new(FilesystemVault::new(config.admissions.upload_dir.clone())),
        Arc::new(cutoffs),
        Arc::new(RandomConfidenceScorer),
        config.admissions.lifecycle_settings(),
    ));

    let app = with_lifecycle_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        academic_year = %config.admissions.academic_year,
        "admission portal ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
