pub mod currency;
pub mod error;
pub mod money;
pub mod period;

pub use currency::Currency;
pub use error::{AppError, Result};
pub use period::BillingPeriod;
