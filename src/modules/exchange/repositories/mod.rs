pub mod exchange_rate_repository;

pub use exchange_rate_repository::ExchangeRateRepository;
