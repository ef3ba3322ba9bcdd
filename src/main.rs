use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meterbill::config::Config;
use meterbill::jobs::JobRunner;
use meterbill::middleware::{ProjectKeyAuth, RequestId};
use meterbill::modules::billing::repositories::{
    BillingConfigRepository, MinimumChargeRuleRepository, PricingRuleRepository,
};
use meterbill::modules::events::controllers::event_controller::{self, EventController};
use meterbill::modules::events::repositories::{DurableEventRepository, HotEventRepository};
use meterbill::modules::events::services::{AggregationService, IngestionService, MigrationWorker};
use meterbill::modules::exchange::repositories::ExchangeRateRepository;
use meterbill::modules::exchange::services::CurrencyConverter;
use meterbill::modules::health::controllers::health_controller;
use meterbill::modules::idempotency::IdempotencyRegistry;
use meterbill::modules::invoices::repositories::InvoiceRepository;
use meterbill::modules::invoices::services::InvoiceService;
use meterbill::modules::organizations::repositories::OrganizationRepository;
use meterbill::modules::payments::controllers::payment_controller::{self, PaymentController};
use meterbill::modules::payments::controllers::webhook_controller::{self, WebhookController};
use meterbill::modules::payments::repositories::{PaymentRepository, RefundRepository};
use meterbill::modules::payments::services::{
    GatewayClient, PaymentService, RefundService, RetryScheduler,
};
use meterbill::modules::reconciliation::repositories::ReconciliationRepository;
use meterbill::modules::reconciliation::services::ReconciliationService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meterbill=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Configuration validation failed");

    tracing::info!("Starting meterbill billing engine");
    tracing::info!("Environment: {}", config.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    // Create database connection pool and apply migrations
    let pool = config
        .database
        .create_pool()
        .await
        .expect("Failed to create database pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!(
        "Database pool initialized ({} connections)",
        config.database.max_connections
    );

    // Repositories
    let organizations = Arc::new(OrganizationRepository::new(pool.clone()));
    let hot_events = Arc::new(HotEventRepository::new(pool.clone()));
    let durable_events = Arc::new(DurableEventRepository::new(pool.clone()));
    let pricing_rules = Arc::new(PricingRuleRepository::new(pool.clone()));
    let minimum_rules = Arc::new(MinimumChargeRuleRepository::new(pool.clone()));
    let billing_configs = Arc::new(BillingConfigRepository::new(pool.clone()));
    let exchange_rates = Arc::new(ExchangeRateRepository::new(pool.clone()));
    let invoices = Arc::new(InvoiceRepository::new(pool.clone()));
    let payments = Arc::new(PaymentRepository::new(pool.clone()));
    let refunds = Arc::new(RefundRepository::new(pool.clone()));
    let reconciliation_runs = Arc::new(ReconciliationRepository::new(pool.clone()));

    // Services
    let registry = Arc::new(IdempotencyRegistry::new(pool.clone()));
    let converter = Arc::new(CurrencyConverter::new(Arc::clone(&exchange_rates)));
    let ingestion = Arc::new(IngestionService::new(Arc::clone(&hot_events)));
    let aggregation = Arc::new(AggregationService::new(pool.clone()));
    let migration_worker = Arc::new(MigrationWorker::new(
        Arc::clone(&hot_events),
        Arc::clone(&durable_events),
        config.migration.clone(),
    ));
    let gateway = Arc::new(GatewayClient::new(config.gateway.clone()));
    let invoice_service = Arc::new(InvoiceService::new(
        pool.clone(),
        Arc::clone(&registry),
        Arc::clone(&invoices),
        Arc::clone(&aggregation),
        Arc::clone(&pricing_rules),
        Arc::clone(&minimum_rules),
        Arc::clone(&billing_configs),
        Arc::clone(&converter),
    ));
    let payment_service = Arc::new(PaymentService::new(
        Arc::clone(&registry),
        Arc::clone(&payments),
        Arc::clone(&invoices),
        Arc::clone(&gateway),
        Arc::clone(&converter),
        config.retry.clone(),
    ));
    let refund_service = Arc::new(RefundService::new(
        pool.clone(),
        Arc::clone(&registry),
        Arc::clone(&payments),
        Arc::clone(&invoices),
        Arc::clone(&refunds),
        Arc::clone(&gateway),
    ));
    let retry_scheduler = Arc::new(RetryScheduler::new(
        Arc::clone(&payments),
        Arc::clone(&invoices),
        Arc::clone(&gateway),
        config.retry.clone(),
    ));
    let reconciliation = Arc::new(ReconciliationService::new(
        Arc::clone(&hot_events),
        Arc::clone(&durable_events),
        Arc::clone(&aggregation),
        Arc::clone(&payments),
        Arc::clone(&reconciliation_runs),
    ));

    // Background jobs
    Arc::new(JobRunner {
        migration: Arc::clone(&migration_worker),
        retry: Arc::clone(&retry_scheduler),
        reconciliation: Arc::clone(&reconciliation),
        invoices: Arc::clone(&invoice_service),
        organizations: Arc::clone(&organizations),
        aggregation: Arc::clone(&aggregation),
        registry: Arc::clone(&registry),
    })
    .spawn();

    // Controllers
    let event_controller = web::Data::new(EventController::new(Arc::clone(&ingestion)));
    let payment_controller = web::Data::new(PaymentController::new(Arc::clone(&payment_service)));
    let webhook_controller = web::Data::new(WebhookController::new(
        Arc::clone(&gateway),
        Arc::clone(&payment_service),
        Arc::clone(&refund_service),
    ));

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(event_controller.clone())
            .app_data(payment_controller.clone())
            .app_data(webhook_controller.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .wrap(RequestId)
            .configure(health_controller::configure_routes)
            .configure(payment_controller::configure_routes)
            .configure(webhook_controller::configure_routes)
            .service(
                web::scope("")
                    .wrap(ProjectKeyAuth)
                    .configure(event_controller::configure_routes),
            )
    })
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await
}
