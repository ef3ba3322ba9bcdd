pub mod reconciliation_repository;

pub use reconciliation_repository::ReconciliationRepository;
