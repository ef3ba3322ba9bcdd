//! Effective-rule resolution.
//!
//! Precedence is explicit rather than row-order dependent: among rules that
//! cover the billing-period start, an org-specific rule shadows a global
//! one, and within the same scope the most recent `effective_from` wins.

use chrono::{DateTime, Utc};

use crate::modules::billing::models::{MinimumChargeRule, PricingRule};

/// Common shape of time-bounded, optionally org-scoped rules
pub trait EffectiveRule {
    fn is_org_specific(&self) -> bool;
    fn effective_from(&self) -> DateTime<Utc>;
    fn applies_at(&self, at: DateTime<Utc>) -> bool;
}

impl EffectiveRule for PricingRule {
    fn is_org_specific(&self) -> bool {
        self.org_id.is_some()
    }
    fn effective_from(&self) -> DateTime<Utc> {
        self.effective_from
    }
    fn applies_at(&self, at: DateTime<Utc>) -> bool {
        PricingRule::applies_at(self, at)
    }
}

impl EffectiveRule for MinimumChargeRule {
    fn is_org_specific(&self) -> bool {
        self.org_id.is_some()
    }
    fn effective_from(&self) -> DateTime<Utc> {
        self.effective_from
    }
    fn applies_at(&self, at: DateTime<Utc>) -> bool {
        MinimumChargeRule::applies_at(self, at)
    }
}

/// Pick the rule in effect at `at` among the given candidates
pub fn resolve_effective<'a, R, I>(rules: I, at: DateTime<Utc>) -> Option<&'a R>
where
    R: EffectiveRule + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut candidates: Vec<&R> = rules.into_iter().filter(|r| r.applies_at(at)).collect();

    candidates.sort_by(|a, b| {
        b.is_org_specific()
            .cmp(&a.is_org_specific())
            .then(b.effective_from().cmp(&a.effective_from()))
    });

    candidates.into_iter().next()
}

/// Pick the pricing rule for one aggregate key at the billing-period start
pub fn resolve_pricing_rule<'a>(
    rules: &'a [PricingRule],
    metric: &str,
    unit: &str,
    at: DateTime<Utc>,
) -> Option<&'a PricingRule> {
    resolve_effective(rules.iter().filter(|r| r.matches(metric, unit)), at)
}

/// Pick the minimum-charge rule in effect at `at`
pub fn resolve_minimum_rule<'a>(
    rules: &'a [MinimumChargeRule],
    at: DateTime<Utc>,
) -> Option<&'a MinimumChargeRule> {
    resolve_effective(rules.iter(), at)
}
