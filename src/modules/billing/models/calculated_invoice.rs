use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Currency;

/// One computed invoice line before persistence.
///
/// `line_number` is assigned by the invoice repository at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedLineItem {
    pub project_id: Option<Uuid>,
    pub description: String,
    pub metric: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub currency: Currency,
}

/// An aggregate the calculator had to drop because no pricing rule covered
/// it. The caller is responsible for reporting these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpricedAggregate {
    pub project_id: Uuid,
    pub metric: String,
    pub unit: String,
    pub total_value: Decimal,
}

/// Output of the pure billing calculation: everything the invoice service
/// needs to persist a draft invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedInvoice {
    /// Sum of priced line totals before any minimum top-up
    pub subtotal: Decimal,
    /// Subtotal after the minimum-charge top-up, the tax base
    pub subtotal_effective: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub currency: Currency,
    pub month: u32,
    pub year: i32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub line_items: Vec<CalculatedLineItem>,
    pub unpriced: Vec<UnpricedAggregate>,
}
