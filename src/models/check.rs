use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::analysis::{AnalysisStatus, ChunkAnalysis, Classification, IssueSeverity};

/// Check types run for every verification job.
pub const CONFIGURED_CHECKS: [CheckType; 2] = [CheckType::Security, CheckType::Performance];

/// A check passes iff its score reaches this threshold.
pub const PASS_SCORE: i32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckType {
    Security,
    Performance,
}

/// Lifecycle of a check row. Created as `Running` at job start; moves exactly
/// once to `Passed`, `Failed`, or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Error,
}

/// Persisted per-check-type outcome of a verification job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: Uuid,
    pub plugin_id: Uuid,
    pub check_type: CheckType,
    pub status: CheckStatus,
    pub score: Option<i32>,
    pub classification: Option<Classification>,
    pub details: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Terminal data written when a check finishes normally.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub score: i32,
    pub classification: Classification,
    pub details: serde_json::Value,
    pub execution_time_ms: i64,
}

const SAFE_BASE_SCORE: i32 = 90;
const WARNING_BASE_SCORE: i32 = 60;
const DANGER_BASE_SCORE: i32 = 20;

fn severity_penalty(severity: IssueSeverity) -> i32 {
    match severity {
        IssueSeverity::Low => 2,
        IssueSeverity::Medium => 5,
        IssueSeverity::High => 10,
        IssueSeverity::Critical => 15,
    }
}

/// Derive the 0-100 check score from a merged analysis result: base score by
/// status, minus a penalty per reported issue.
pub fn score_for(result: &ChunkAnalysis) -> i32 {
    let base = match result.status {
        AnalysisStatus::Safe => SAFE_BASE_SCORE,
        AnalysisStatus::Warning => WARNING_BASE_SCORE,
        AnalysisStatus::Danger => DANGER_BASE_SCORE,
    };
    let penalty: i32 = result
        .issues
        .iter()
        .map(|issue| severity_penalty(issue.severity))
        .sum();
    (base - penalty).clamp(0, 100)
}

/// Terminal status for a score: passed iff `score >= PASS_SCORE`.
pub fn status_for_score(score: i32) -> CheckStatus {
    if score >= PASS_SCORE {
        CheckStatus::Passed
    } else {
        CheckStatus::Failed
    }
}
