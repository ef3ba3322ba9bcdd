use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{AppError, BillingPeriod, Currency, Result};
use crate::modules::audit::AuditRecorder;
use crate::modules::billing::models::{BillingConfig, MinimumChargeRule, PricingRule};
use crate::modules::billing::repositories::{
    BillingConfigRepository, MinimumChargeRuleRepository, PricingRuleRepository,
};
use crate::modules::billing::services::calculate_invoice;
use crate::modules::events::models::validate_billing_month;
use crate::modules::events::services::AggregationService;
use crate::modules::exchange::services::CurrencyConverter;
use crate::modules::idempotency::{ConflictPolicy, IdempotencyRegistry};
use crate::modules::invoices::models::{Invoice, InvoiceLineItem, InvoiceStatus};
use crate::modules::invoices::repositories::InvoiceRepository;

/// Monthly invoice generation and lifecycle.
///
/// `generate` is single-flight per (org, month, year): the idempotency
/// registry serialises concurrent runs and replays return the winner's
/// invoice id. The partial unique index on invoices is the storage-level
/// backstop for the same invariant.
pub struct InvoiceService {
    pool: PgPool,
    registry: Arc<IdempotencyRegistry>,
    invoices: Arc<InvoiceRepository>,
    aggregation: Arc<AggregationService>,
    pricing_rules: Arc<PricingRuleRepository>,
    minimum_rules: Arc<MinimumChargeRuleRepository>,
    configs: Arc<BillingConfigRepository>,
    converter: Arc<CurrencyConverter>,
}

impl InvoiceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        registry: Arc<IdempotencyRegistry>,
        invoices: Arc<InvoiceRepository>,
        aggregation: Arc<AggregationService>,
        pricing_rules: Arc<PricingRuleRepository>,
        minimum_rules: Arc<MinimumChargeRuleRepository>,
        configs: Arc<BillingConfigRepository>,
        converter: Arc<CurrencyConverter>,
    ) -> Self {
        Self {
            pool,
            registry,
            invoices,
            aggregation,
            pricing_rules,
            minimum_rules,
            configs,
            converter,
        }
    }

    /// Generate the invoice for one organisation's billing month.
    ///
    /// Replays and concurrent callers receive the already-generated invoice
    /// id. The producer transaction re-checks period uniqueness, persists
    /// the draft invoice with its line items and writes the audit record.
    pub async fn generate(&self, org_id: Uuid, month: u32, year: i32) -> Result<Uuid> {
        validate_billing_month(month as i32, year)?;
        let key = format!("invoice:{}:{}:{}", org_id, year, month);
        let period = BillingPeriod::of_month(month, year)?;

        // Replays return the winner's invoice without recomputing anything;
        // rule changes after generation must not affect the answer.
        if let Some(existing) = self.registry.find(&key).await? {
            if let Some(invoice_id) = existing.entity_id {
                return Ok(invoice_id);
            }
        }

        let config = self
            .configs
            .find_by_org(org_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No billing config for organisation {}", org_id))
            })?;

        let aggregates = self.aggregation.list_for_month(org_id, month, year).await?;
        let pricing = self.pricing_rules.list_for_org(org_id).await?;
        let minimums = self.minimum_rules.list_for_org(org_id).await?;

        // Foreign-currency rules are converted at the historical rate of the
        // billing-period start; a missing rate refuses the whole run.
        let (pricing, conversion) = self
            .convert_pricing_rules(pricing, &config, period.start)
            .await?;
        let minimums = self
            .convert_minimum_rules(minimums, &config, period.start)
            .await?;

        let calc = calculate_invoice(&aggregates, &pricing, &minimums, &config, month, year)?;

        for unpriced in &calc.unpriced {
            tracing::warn!(
                org_id = %org_id,
                project_id = %unpriced.project_id,
                metric = %unpriced.metric,
                unit = %unpriced.unit,
                total_value = %unpriced.total_value,
                "Aggregate dropped from invoice: no applicable pricing rule"
            );
        }

        let invoice = Self::build_invoice(org_id, &calc, conversion)?;
        let invoice_number = invoice.number.clone();

        let invoices = Arc::clone(&self.invoices);
        let invoice_id = self
            .registry
            .register(
                &key,
                "invoice",
                None,
                None,
                ConflictPolicy::ReturnExisting,
                move |tx| {
                    Box::pin(async move {
                        // The registry already serialises duplicate keys; this
                        // guards against invoices created outside it.
                        if let Some(existing) = invoices
                            .find_for_period_with_tx(tx, invoice.org_id, month, year)
                            .await?
                        {
                            return Err(AppError::conflict(format!(
                                "Invoice {} already exists for {}-{:02}",
                                existing, year, month
                            )));
                        }

                        invoices.create_with_tx(tx, &invoice).await?;

                        AuditRecorder::record_with_tx(
                            tx,
                            "invoice",
                            invoice.id,
                            "created",
                            Some(serde_json::json!({
                                "number": invoice.number,
                                "total": invoice.total.to_string(),
                                "currency": invoice.currency.to_string(),
                                "line_items": invoice.line_items.len(),
                            })),
                        )
                        .await?;

                        Ok(invoice.id)
                    })
                },
            )
            .await?;

        tracing::info!(
            org_id = %org_id,
            invoice_id = %invoice_id,
            number = %invoice_number,
            month = month,
            year = year,
            "Invoice generation complete"
        );

        Ok(invoice_id)
    }

    /// Seal a draft invoice.
    ///
    /// Conditional on the current status: once finalized, the database
    /// triggers refuse any further monetary change.
    pub async fn finalize(&self, invoice_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let finalized = self
            .invoices
            .finalize_with_tx(&mut tx, invoice_id, Utc::now())
            .await?;

        if !finalized {
            tx.rollback().await?;
            return match self.invoices.fetch_status(invoice_id).await? {
                None => Err(AppError::not_found(format!("Invoice {} not found", invoice_id))),
                Some(status) => Err(AppError::conflict(format!(
                    "Invoice {} is {} and cannot be finalized",
                    invoice_id, status
                ))),
            };
        }

        AuditRecorder::record_with_tx(&mut tx, "invoice", invoice_id, "finalized", None).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %invoice_id, "Invoice finalized");
        Ok(())
    }

    /// Finalized -> sent. Delivery itself is out of band.
    pub async fn mark_sent(&self, invoice_id: Uuid) -> Result<()> {
        let updated = self.invoices.mark_sent(invoice_id, Utc::now()).await?;
        if !updated {
            return match self.invoices.fetch_status(invoice_id).await? {
                None => Err(AppError::not_found(format!("Invoice {} not found", invoice_id))),
                Some(status) => Err(AppError::conflict(format!(
                    "Invoice {} is {} and cannot be marked sent",
                    invoice_id, status
                ))),
            };
        }
        Ok(())
    }

    async fn convert_pricing_rules(
        &self,
        rules: Vec<PricingRule>,
        config: &BillingConfig,
        at: DateTime<Utc>,
    ) -> Result<(Vec<PricingRule>, Option<(Currency, Decimal)>)> {
        let mut converted = Vec::with_capacity(rules.len());
        let mut conversion: Option<(Currency, Decimal)> = None;

        for mut rule in rules {
            if rule.currency != config.currency {
                let rate = self
                    .converter
                    .rate(rule.currency, config.currency, at)
                    .await?
                    .ok_or_else(|| {
                        AppError::payment(format!(
                            "No exchange rate available for {}->{} at {}",
                            rule.currency, config.currency, at
                        ))
                    })?;

                rule.price_per_unit = self
                    .converter
                    .convert_rate(rule.price_per_unit, rule.currency, config.currency, at)
                    .await?;

                // Record the source currency when exactly one is involved
                conversion = match conversion {
                    None => Some((rule.currency, rate)),
                    Some((currency, _)) if currency == rule.currency => conversion,
                    Some(_) => None,
                };

                rule.currency = config.currency;
            }
            converted.push(rule);
        }

        Ok((converted, conversion))
    }

    async fn convert_minimum_rules(
        &self,
        rules: Vec<MinimumChargeRule>,
        config: &BillingConfig,
        at: DateTime<Utc>,
    ) -> Result<Vec<MinimumChargeRule>> {
        let mut converted = Vec::with_capacity(rules.len());

        for mut rule in rules {
            if rule.currency != config.currency {
                rule.amount = self
                    .converter
                    .convert(rule.amount, rule.currency, config.currency, at)
                    .await?;
                rule.currency = config.currency;
            }
            converted.push(rule);
        }

        Ok(converted)
    }

    fn build_invoice(
        org_id: Uuid,
        calc: &crate::modules::billing::models::CalculatedInvoice,
        conversion: Option<(Currency, Decimal)>,
    ) -> Result<Invoice> {
        let invoice_id = Uuid::new_v4();
        let number = format!(
            "INV-{}{:02}-{}",
            calc.year,
            calc.month,
            &invoice_id.simple().to_string()[..8]
        );

        let line_items = calc
            .line_items
            .iter()
            .enumerate()
            .map(|(index, line)| {
                InvoiceLineItem::new(
                    invoice_id,
                    (index + 1) as i32,
                    line.project_id,
                    line.description.clone(),
                    line.metric.clone(),
                    line.quantity,
                    line.unit.clone(),
                    line.unit_price,
                    line.total,
                    line.currency,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let now = Utc::now();
        let invoice = Invoice {
            id: invoice_id,
            org_id,
            number,
            status: InvoiceStatus::Draft,
            subtotal: calc.subtotal_effective,
            tax: calc.tax,
            discount: calc.discount,
            total: calc.total,
            currency: calc.currency,
            billing_period_start: calc.period_start,
            billing_period_end: calc.period_end,
            due_date: calc.due_date,
            month: calc.month as i32,
            year: calc.year,
            finalized_at: None,
            issued_at: None,
            paid_at: None,
            pdf_url: None,
            template_id: None,
            original_currency: conversion.map(|(currency, _)| currency.to_string()),
            exchange_rate: conversion.map(|(_, rate)| rate),
            metadata: None,
            created_at: now,
            updated_at: now,
            line_items,
        };

        invoice.validate()?;
        Ok(invoice)
    }
}
