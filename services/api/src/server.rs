use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryStorage, LoggingNotifier};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use jobmarket::config::AppConfig;
use jobmarket::error::AppError;
use jobmarket::marketplace::service::MarketplaceService;
use jobmarket::telemetry;
use std::sync::atomic::Ordering;
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let storage = Arc::new(InMemoryStorage::default());
    let notifier = Arc::new(LoggingNotifier);
    let service = Arc::new(MarketplaceService::new(
        storage,
        notifier,
        config.marketplace.clone(),
    ));

    if let Some(bootstrap) = &config.marketplace.admin_bootstrap {
        match service.bootstrap_admin(&bootstrap.email, &bootstrap.password) {
            Ok(admin) => info!(admin_id = admin.id.0, "admin account ready"),
            Err(err) => warn!(error = %err, "admin bootstrap failed"),
        }
    }

    let app = with_marketplace_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "job marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
