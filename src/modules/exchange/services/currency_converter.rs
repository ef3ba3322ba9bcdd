use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::core::money::{round_money, round_rate};
use crate::core::{AppError, Currency, Result};
use crate::modules::exchange::repositories::ExchangeRateRepository;

/// Historical currency conversion.
///
/// Identity conversions are free; a missing rate yields `None` and callers
/// must refuse to convert rather than guess.
pub struct CurrencyConverter {
    rates: Arc<ExchangeRateRepository>,
}

impl CurrencyConverter {
    pub fn new(rates: Arc<ExchangeRateRepository>) -> Self {
        Self { rates }
    }

    /// The from→to rate in effect at `at`, at rate precision (scale 8).
    ///
    /// Falls back to the inverse row (to→from) as `1 / rate` when no direct
    /// row covers the instant.
    pub async fn rate(
        &self,
        from: Currency,
        to: Currency,
        at: DateTime<Utc>,
    ) -> Result<Option<Decimal>> {
        if from == to {
            return Ok(Some(Decimal::ONE));
        }

        if let Some(direct) = self.rates.find_rate(from, to, at).await? {
            return Ok(Some(round_rate(direct.rate)));
        }

        if let Some(inverse) = self.rates.find_rate(to, from, at).await? {
            if inverse.rate > Decimal::ZERO {
                return Ok(Some(round_rate(Decimal::ONE / inverse.rate)));
            }
        }

        Ok(None)
    }

    /// Convert a settlement amount, refusing when no rate is known
    pub async fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
        at: DateTime<Utc>,
    ) -> Result<Decimal> {
        let rate = self.rate(from, to, at).await?.ok_or_else(|| {
            AppError::payment(format!(
                "No exchange rate available for {}->{} at {}",
                from, to, at
            ))
        })?;

        Ok(round_money(amount * rate))
    }

    /// Convert a per-unit price, keeping rate precision (scale 8)
    pub async fn convert_rate(
        &self,
        price: Decimal,
        from: Currency,
        to: Currency,
        at: DateTime<Utc>,
    ) -> Result<Decimal> {
        let rate = self.rate(from, to, at).await?.ok_or_else(|| {
            AppError::payment(format!(
                "No exchange rate available for {}->{} at {}",
                from, to, at
            ))
        })?;

        Ok(round_rate(price * rate))
    }
}
