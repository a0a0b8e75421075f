use crate::cli::ServeArgs;
use crate::infra::{demo_cast, seed_demo, AppState, LogNotifications};
use crate::routes::with_leasing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use nulo::config::AppConfig;
use nulo::error::AppError;
use nulo::leasing::{InMemoryLeasingStore, LeasingState, StaticTokenGateway};
use nulo::telemetry;
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

    let store = Arc::new(InMemoryLeasingStore::default());
    let gateway = Arc::new(StaticTokenGateway::default());
    if args.seed_demo {
        let cast = demo_cast();
        match seed_demo(&store, gateway.as_ref(), &cast).await {
            Ok(()) => info!(
                tenant_token = %format!("demo-{}", cast.tenant.id),
                landlord_token = %format!("demo-{}", cast.landlord.id),
                properties = cast.properties.len(),
                "demo catalog seeded"
            ),
            Err(err) => warn!(error = %err, "demo catalog could not be seeded"),
        }
    }

    let leasing = Arc::new(LeasingState::new(
        store,
        Arc::new(LogNotifications),
        gateway,
        &config.leasing,
    ));

    let app = with_leasing_routes(leasing)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        currency = %config.leasing.currency,
        "leasing service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
