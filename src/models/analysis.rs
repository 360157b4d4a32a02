use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Maximum length of the model-provided summary line.
pub const SHORT_DESCRIPTION_MAX: usize = 200;

/// Three-level chunk verdict.
///
/// Variants are declared in ascending severity so the derived `Ord` gives
/// the merge precedence danger > warning > safe directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnalysisStatus {
    Safe,
    Warning,
    Danger,
}

/// Four-level severity taxonomy, independent of [`AnalysisStatus`].
///
/// Ascending declaration order, same reason as above.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    Safe,
    PotentiallyUnsafe,
    Unsafe,
    Critical,
}

/// Severity of a single reported issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One finding reported by the model for a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: IssueSeverity,
    pub description: String,
    pub recommendation: String,
}

/// Result of analyzing one chunk, and also the shape of a merged
/// check-level result. This is the wire contract with the model: camelCase
/// JSON with the exact enum domains above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAnalysis {
    #[garde(skip)]
    pub status: AnalysisStatus,

    #[garde(skip)]
    pub classification: Classification,

    #[garde(length(max = 200))]
    pub short_description: String,

    #[garde(skip)]
    pub issues: Vec<Issue>,
}
