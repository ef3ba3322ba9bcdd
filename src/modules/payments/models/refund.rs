use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum RefundStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "processed")]
    Processed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processed => "processed",
            RefundStatus::Failed => "failed",
            RefundStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl TryFrom<String> for RefundStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.as_str() {
            "pending" => Ok(RefundStatus::Pending),
            "processed" => Ok(RefundStatus::Processed),
            "failed" => Ok(RefundStatus::Failed),
            "cancelled" => Ok(RefundStatus::Cancelled),
            other => Err(format!("Invalid refund status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum RefundType {
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "partial")]
    Partial,
}

impl std::fmt::Display for RefundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundType::Full => write!(f, "full"),
            RefundType::Partial => write!(f, "partial"),
        }
    }
}

impl TryFrom<String> for RefundType {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.as_str() {
            "full" => Ok(RefundType::Full),
            "partial" => Ok(RefundType::Partial),
            other => Err(format!("Invalid refund type: {}", other)),
        }
    }
}

/// A refund against one payment. `amount` can never exceed what remains
/// refundable on the payment at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Refund {
    pub id: Uuid,
    pub org_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_id: Uuid,
    pub number: String,
    pub gateway_refund_id: Option<String>,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    #[sqlx(try_from = "String")]
    pub status: RefundStatus,
    #[sqlx(try_from = "String")]
    pub refund_type: RefundType,
    pub reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        org_id: Uuid,
        invoice_id: Uuid,
        payment_id: Uuid,
        amount: Decimal,
        currency: Currency,
        refund_type: RefundType,
        reason: Option<String>,
    ) -> Result<Self> {
        if amount <= Decimal::ZERO {
            return Err(AppError::validation(format!(
                "refund amount must be positive, got {}",
                amount
            )));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        Ok(Self {
            id,
            org_id,
            invoice_id,
            payment_id,
            number: format!("REF-{}", &id.simple().to_string()[..12]),
            gateway_refund_id: None,
            amount,
            currency,
            status: RefundStatus::Pending,
            refund_type,
            reason,
            processed_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}
