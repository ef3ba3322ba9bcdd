use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which two sources a run cross-checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum SourcePair {
    #[serde(rename = "hot_vs_durable")]
    HotVsDurable,
    #[serde(rename = "aggregates_vs_events")]
    AggregatesVsEvents,
    #[serde(rename = "local_vs_gateway")]
    LocalVsGateway,
}

impl std::fmt::Display for SourcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourcePair::HotVsDurable => "hot_vs_durable",
            SourcePair::AggregatesVsEvents => "aggregates_vs_events",
            SourcePair::LocalVsGateway => "local_vs_gateway",
        };
        write!(f, "{}", s)
    }
}

impl TryFrom<String> for SourcePair {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "hot_vs_durable" => Ok(SourcePair::HotVsDurable),
            "aggregates_vs_events" => Ok(SourcePair::AggregatesVsEvents),
            "local_vs_gateway" => Ok(SourcePair::LocalVsGateway),
            other => Err(format!("Invalid source pair: {}", other)),
        }
    }
}

/// Outcome of one reconciled scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum RunStatus {
    #[serde(rename = "reconciled")]
    Reconciled,
    #[serde(rename = "discrepancy")]
    Discrepancy,
    #[serde(rename = "error")]
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Reconciled => "reconciled",
            RunStatus::Discrepancy => "discrepancy",
            RunStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl TryFrom<String> for RunStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, <RunStatus as TryFrom<String>>::Error> {
        match s.as_str() {
            "reconciled" => Ok(RunStatus::Reconciled),
            "discrepancy" => Ok(RunStatus::Discrepancy),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("Invalid run status: {}", other)),
        }
    }
}

/// One reconciliation outcome: a (source pair, scope, date) row with the
/// counts the two sides reported.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReconciliationRun {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub source_pair: SourcePair,
    pub scope: String,
    pub run_date: NaiveDate,
    pub expected_count: i64,
    pub actual_count: i64,
    #[sqlx(try_from = "String")]
    pub status: RunStatus,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl ReconciliationRun {
    pub fn new(
        source_pair: SourcePair,
        scope: String,
        run_date: NaiveDate,
        expected_count: i64,
        actual_count: i64,
        detail: Option<serde_json::Value>,
    ) -> Self {
        let status = if expected_count == actual_count {
            RunStatus::Reconciled
        } else {
            RunStatus::Discrepancy
        };

        Self {
            id: Uuid::new_v4(),
            source_pair,
            scope,
            run_date,
            expected_count,
            actual_count,
            status,
            detail,
            created_at: Utc::now(),
        }
    }

    pub fn error(
        source_pair: SourcePair,
        scope: String,
        run_date: NaiveDate,
        error: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_pair,
            scope,
            run_date,
            expected_count: 0,
            actual_count: 0,
            status: RunStatus::Error,
            detail: Some(serde_json::json!({ "error": error })),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derived_from_counts() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let ok = ReconciliationRun::new(
            SourcePair::HotVsDurable,
            "scope".to_string(),
            date,
            10,
            10,
            None,
        );
        assert_eq!(ok.status, RunStatus::Reconciled);

        let off = ReconciliationRun::new(
            SourcePair::HotVsDurable,
            "scope".to_string(),
            date,
            10,
            9,
            None,
        );
        assert_eq!(off.status, RunStatus::Discrepancy);
    }
}
