use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::money::within_tolerance;
use crate::core::{AppError, Currency, Result};

use super::line_item::InvoiceLineItem;

/// Invoice status lifecycle.
///
/// `draft -> finalized -> (sent) -> paid -> refunded`, with `overdue` as a
/// side state past the due date. Finalization seals all monetary and period
/// fields; from then on only the status may move, and only within the
/// finalized-derived set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "finalized")]
    Finalized,
    #[serde(rename = "sent")]
    Sent,
    #[serde(rename = "paid")]
    Paid,
    #[serde(rename = "overdue")]
    Overdue,
    #[serde(rename = "refunded")]
    Refunded,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "void")]
    Void,
}

impl InvoiceStatus {
    /// Statuses reachable once an invoice has been finalized
    pub fn is_finalized_derived(&self) -> bool {
        !matches!(self, InvoiceStatus::Draft)
    }

    /// No further transitions leave these states (except paid -> refunded)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Cancelled | InvoiceStatus::Void | InvoiceStatus::Refunded
        )
    }

    /// Whether `self -> to` is a legal transition
    pub fn can_transition(&self, to: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, to),
            (Draft, Finalized | Cancelled | Void)
                | (Finalized, Sent | Paid | Overdue | Refunded | Cancelled | Void)
                | (Sent, Paid | Overdue | Refunded | Cancelled | Void)
                | (Overdue, Paid | Refunded | Cancelled | Void)
                | (Paid, Refunded)
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Finalized => "finalized",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Refunded => "refunded",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Void => "void",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "finalized" => Ok(InvoiceStatus::Finalized),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "refunded" => Ok(InvoiceStatus::Refunded),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            "void" => Ok(InvoiceStatus::Void),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// A monthly invoice. Unique per (org, month, year) among non-cancelled
/// invoices; `subtotal` is the effective subtotal (after any minimum-charge
/// top-up), so `total = subtotal + tax - discount`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub org_id: Uuid,
    pub number: String,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    pub billing_period_start: DateTime<Utc>,
    pub billing_period_end: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub month: i32,
    pub year: i32,
    pub finalized_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub pdf_url: Option<String>,
    pub template_id: Option<Uuid>,
    pub original_currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub line_items: Vec<InvoiceLineItem>,
}

impl Invoice {
    /// Pre-persistence invariant checks.
    ///
    /// Any failure here is an Integrity error and blocks the insert.
    pub fn validate(&self) -> Result<()> {
        if self.subtotal < Decimal::ZERO
            || self.tax < Decimal::ZERO
            || self.discount < Decimal::ZERO
            || self.total < Decimal::ZERO
        {
            return Err(AppError::integrity(format!(
                "invoice {} carries a negative monetary field",
                self.number
            )));
        }

        let expected_total = self.subtotal + self.tax - self.discount;
        if !within_tolerance(self.total, expected_total) {
            return Err(AppError::integrity(format!(
                "invoice {} total {} does not match subtotal {} + tax {} - discount {}",
                self.number, self.total, self.subtotal, self.tax, self.discount
            )));
        }

        let line_sum: Decimal = self.line_items.iter().map(|line| line.total).sum();
        if !within_tolerance(line_sum, self.subtotal) {
            return Err(AppError::integrity(format!(
                "invoice {} line totals {} do not match subtotal {}",
                self.number, line_sum, self.subtotal
            )));
        }

        if self.billing_period_start > self.billing_period_end {
            return Err(AppError::integrity(format!(
                "invoice {} billing period is inverted",
                self.number
            )));
        }

        for line in &self.line_items {
            line.validate()?;
        }

        Ok(())
    }

    /// Refuse mutation of sealed invoices. The database trigger is the
    /// backstop; this keeps the in-process model honest before it hits it.
    pub fn ensure_mutable(&self) -> Result<()> {
        if self.status != InvoiceStatus::Draft {
            return Err(AppError::conflict(format!(
                "Invoice {} is {} and can no longer be modified",
                self.number, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn invoice_with(subtotal: Decimal, tax: Decimal, total: Decimal) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            number: "INV-202401-deadbeef".to_string(),
            status: InvoiceStatus::Draft,
            subtotal,
            tax,
            discount: Decimal::ZERO,
            total,
            currency: Currency::INR,
            billing_period_start: now,
            billing_period_end: now,
            due_date: now,
            month: 1,
            year: 2024,
            finalized_at: None,
            issued_at: None,
            paid_at: None,
            pdf_url: None,
            template_id: None,
            original_currency: None,
            exchange_rate: None,
            metadata: None,
            created_at: now,
            updated_at: now,
            line_items: vec![],
        }
    }

    #[test]
    fn test_validate_total_identity() {
        let mut inv = invoice_with(dec!(10.00), dec!(1.80), dec!(11.80));
        assert!(inv.validate().is_err()); // no line items backing the subtotal

        inv.line_items.push(
            InvoiceLineItem::new(
                inv.id,
                1,
                None,
                "api_calls (count)".to_string(),
                "api_calls".to_string(),
                dec!(10000),
                "count".to_string(),
                dec!(0.001),
                dec!(10.00),
                Currency::INR,
            )
            .unwrap(),
        );
        assert!(inv.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_total_drift() {
        let inv = invoice_with(dec!(10.00), dec!(1.80), dec!(12.00));
        assert!(inv.validate().is_err());
    }

    #[test]
    fn test_status_machine() {
        use InvoiceStatus::*;
        assert!(Draft.can_transition(Finalized));
        assert!(Finalized.can_transition(Paid));
        assert!(Finalized.can_transition(Sent));
        assert!(Sent.can_transition(Paid));
        assert!(Paid.can_transition(Refunded));
        assert!(!Paid.can_transition(Draft));
        assert!(!Refunded.can_transition(Paid));
        assert!(!Draft.can_transition(Paid));
        assert!(!Cancelled.can_transition(Finalized));
    }

    #[test]
    fn test_finalized_invoice_is_immutable() {
        let mut inv = invoice_with(dec!(0), dec!(0), dec!(0));
        assert!(inv.ensure_mutable().is_ok());
        inv.status = InvoiceStatus::Finalized;
        assert!(inv.ensure_mutable().is_err());
    }
}
