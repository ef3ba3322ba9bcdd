use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// Payment status lifecycle.
///
/// Gateway statuses map onto this set; anything the gateway reports that is
/// not authorized/captured/failed/refunded lands in `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum PaymentStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "authorized")]
    Authorized,
    #[serde(rename = "captured")]
    Captured,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "refunded")]
    Refunded,
    #[serde(rename = "partially_refunded")]
    PartiallyRefunded,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl PaymentStatus {
    /// Map a gateway-reported status onto the local state machine
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "authorized" => PaymentStatus::Authorized,
            "captured" => PaymentStatus::Captured,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "authorized" => Ok(PaymentStatus::Authorized),
            "captured" => Ok(PaymentStatus::Captured),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            "partially_refunded" => Ok(PaymentStatus::PartiallyRefunded),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// One retry attempt, appended to the payment's immutable retry history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub attempt: i32,
    pub at: DateTime<Utc>,
    pub gateway_order_id: Option<String>,
    pub error: Option<String>,
}

/// A payment against one invoice.
///
/// The retry scheduler and the webhook path both mutate this row; every
/// update asserts the prior state so the two compose under row locks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub invoice_id: Uuid,
    pub number: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub refund_amount: Decimal,
    pub refunded_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub retry_history: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        org_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
        currency: Currency,
        gateway_order_id: String,
        max_retries: i32,
    ) -> Result<Self> {
        if amount <= Decimal::ZERO {
            return Err(AppError::validation(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        Ok(Self {
            id,
            org_id,
            invoice_id,
            number: format!("PAY-{}", &id.simple().to_string()[..12]),
            gateway_order_id: Some(gateway_order_id),
            gateway_payment_id: None,
            amount,
            currency,
            status: PaymentStatus::Pending,
            method: None,
            paid_at: None,
            reconciled_at: None,
            refund_amount: Decimal::ZERO,
            refunded_at: None,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            last_retry_at: None,
            retry_history: serde_json::Value::Array(vec![]),
            metadata: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Amount still refundable on this payment
    pub fn remaining_refundable(&self) -> Decimal {
        self.amount - self.refund_amount
    }

    /// Typed view of the retry history
    pub fn retry_attempts(&self) -> Vec<RetryAttempt> {
        serde_json::from_value(self.retry_history.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_gateway_status_mapping() {
        assert_eq!(
            PaymentStatus::from_gateway("authorized"),
            PaymentStatus::Authorized
        );
        assert_eq!(
            PaymentStatus::from_gateway("captured"),
            PaymentStatus::Captured
        );
        assert_eq!(PaymentStatus::from_gateway("failed"), PaymentStatus::Failed);
        assert_eq!(
            PaymentStatus::from_gateway("refunded"),
            PaymentStatus::Refunded
        );
        // Everything else is pending
        assert_eq!(PaymentStatus::from_gateway("created"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_gateway("weird"), PaymentStatus::Pending);
    }

    #[test]
    fn test_payment_rejects_non_positive_amount() {
        let result = Payment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decimal::ZERO,
            Currency::INR,
            "order_1".to_string(),
            3,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_remaining_refundable() {
        let mut payment = Payment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(118.00),
            Currency::INR,
            "order_1".to_string(),
            3,
        )
        .unwrap();
        assert_eq!(payment.remaining_refundable(), dec!(118.00));
        payment.refund_amount = dec!(100.00);
        assert_eq!(payment.remaining_refundable(), dec!(18.00));
    }
}
