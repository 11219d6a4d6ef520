use axum::routing::{get, post};
use axum::Router;
use payment_service::config::AppConfig;
use payment_service::gateways::waafipay::WaafipayGateway;
use payment_service::gateways::PayerValidator;
use payment_service::notify::channel::ChannelBroadcaster;
use payment_service::notify::redis_stream::RedisStreamPublisher;
use payment_service::service::polling::PollScheduler;
use payment_service::service::reconciliation::ReconciliationEngine;
use payment_service::store::postgres::PgPaymentStore;
use payment_service::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;

    let scheduler = Arc::new(PollScheduler::new(&cfg.polling));
    let engine = Arc::new(ReconciliationEngine {
        store: Arc::new(PgPaymentStore { pool }),
        gateway: Arc::new(WaafipayGateway::new(&cfg.gateway)),
        broadcaster: Arc::new(ChannelBroadcaster::new(256)),
        publisher: Arc::new(RedisStreamPublisher {
            client: redis_client,
            stream_key: cfg.stream_key.clone(),
        }),
        scheduler,
        payer: PayerValidator::new(&cfg.gateway)?,
    });

    let state = AppState { engine };

    let app = Router::new()
        .route("/health", get(payment_service::http::handlers::payments::health))
        .route(
            "/payments/initiate",
            post(payment_service::http::handlers::payments::initiate_payment),
        )
        .route(
            "/payments/webhook",
            post(payment_service::http::handlers::webhook::gateway_callback),
        )
        .route(
            "/payments/:payment_id/status",
            get(payment_service::http::handlers::payments::get_status),
        )
        .route(
            "/payments/:payment_id/refund",
            post(payment_service::http::handlers::payments::refund_payment),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
