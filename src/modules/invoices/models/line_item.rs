use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::money::{mul_to_money, within_tolerance};
use crate::core::{AppError, Currency, Result};

/// One priced line of an invoice.
///
/// Line numbers start at 1 and are unique within the invoice. The row is
/// immutable once the parent invoice is finalized (enforced by trigger).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub line_number: i32,
    pub project_id: Option<Uuid>,
    pub description: String,
    pub metric: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total: Decimal,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
}

impl InvoiceLineItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        invoice_id: Uuid,
        line_number: i32,
        project_id: Option<Uuid>,
        description: String,
        metric: String,
        quantity: Decimal,
        unit: String,
        unit_price: Decimal,
        total: Decimal,
        currency: Currency,
    ) -> Result<Self> {
        let line = Self {
            id: Uuid::new_v4(),
            invoice_id,
            line_number,
            project_id,
            description,
            metric,
            quantity,
            unit,
            unit_price,
            total,
            currency,
        };
        line.validate()?;
        Ok(line)
    }

    pub fn validate(&self) -> Result<()> {
        if self.line_number < 1 {
            return Err(AppError::integrity(format!(
                "line_number must be at least 1, got {}",
                self.line_number
            )));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::validation("Line item description cannot be empty"));
        }
        if self.quantity < Decimal::ZERO
            || self.unit_price < Decimal::ZERO
            || self.total < Decimal::ZERO
        {
            return Err(AppError::integrity(format!(
                "line {} carries a negative quantity, price or total",
                self.line_number
            )));
        }

        let expected = mul_to_money(self.quantity, self.unit_price);
        if !within_tolerance(self.total, expected) {
            return Err(AppError::integrity(format!(
                "line {} total {} does not match quantity {} x unit price {}",
                self.line_number, self.total, self.quantity, self.unit_price
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, unit_price: Decimal, total: Decimal) -> Result<InvoiceLineItem> {
        InvoiceLineItem::new(
            Uuid::new_v4(),
            1,
            None,
            "api_calls (count)".to_string(),
            "api_calls".to_string(),
            quantity,
            "count".to_string(),
            unit_price,
            total,
            Currency::INR,
        )
    }

    #[test]
    fn test_line_total_within_tolerance() {
        assert!(line(dec!(1000), dec!(0.001), dec!(1.00)).is_ok());
        // off by exactly the tolerance still passes
        assert!(line(dec!(1000), dec!(0.001), dec!(1.01)).is_ok());
        // beyond tolerance fails
        assert!(line(dec!(1000), dec!(0.001), dec!(1.02)).is_err());
    }

    #[test]
    fn test_line_rejects_negative_fields() {
        assert!(line(dec!(-1), dec!(0.001), dec!(0)).is_err());
        assert!(line(dec!(1), dec!(-0.001), dec!(0)).is_err());
    }

    #[test]
    fn test_line_number_starts_at_one() {
        let mut l = line(dec!(1), dec!(1), dec!(1)).unwrap();
        l.line_number = 0;
        assert!(l.validate().is_err());
    }
}
