pub mod aggregation_service;
pub mod ingestion_service;
pub mod migration_worker;

pub use aggregation_service::AggregationService;
pub use ingestion_service::IngestionService;
pub use migration_worker::{MigrationReport, MigrationWorker};
